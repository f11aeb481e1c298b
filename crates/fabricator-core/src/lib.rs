//! Fabricator Core -- programmatic construction, validation, and
//! serialization of factory-game blueprints.
//!
//! The crate is organized around three layers:
//!
//! 1. **Entity model** -- [`entity::Entity`] records validated against the
//!    immutable game-data tables from `fabricator-data`: name membership in
//!    a prototype class, per-field schemas, comparator normalization.
//! 2. **Blueprint connection graph** -- [`blueprint::Blueprint`] owns
//!    entities keyed by insertion index or string id and maintains mirrored
//!    circuit (red/green) and power edges between them.
//! 3. **Codec** -- [`codec`] converts a blueprint to and from the portable
//!    exchange string: canonical JSON, zlib-compressed, base64-encoded,
//!    wrapped in a one-byte version envelope.
//!
//! # Construction flow
//!
//! ```rust,ignore
//! let data = GameData::builtin();
//! let mut bp = Blueprint::new();
//! let mut chest = Entity::new(&data, "steel-chest")?;
//! chest.set_grid_position(2, 0);
//! bp.add_entity_with_id(Entity::new(&data, "constant-combinator")?, "source")?;
//! bp.add_entity(chest);
//! bp.add_circuit_connection(WireColor::Red, "source", 1)?;
//! let exported = codec::to_string(&bp)?;
//! ```
//!
//! All operations are synchronous and in-memory; every fatal condition is
//! surfaced as a `Result` at the call that violated it. Unknown input keys
//! are retained and reported as warnings rather than rejected, so strings
//! produced by newer game versions still round-trip.

pub mod blueprint;
pub mod codec;
pub mod condition;
pub mod direction;
pub mod entity;
pub mod error;
pub mod position;
pub mod signal;

pub use fabricator_data::{CapabilityFlags, GameData, GameDataBuilder, SignalKind};

pub use blueprint::{Blueprint, ConnectionTarget, EntityRef, Icon, PowerTarget, WireColor};
pub use condition::{ArithmeticOp, Comparator, Operand};
pub use direction::Direction;
pub use entity::Entity;
pub use error::{BlueprintError, EntityError, ExportError, ImportError};
pub use position::Position;
pub use signal::SignalId;

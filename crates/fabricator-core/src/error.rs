//! Error taxonomy for entity construction, graph mutation, and the codec.
//!
//! Every fatal condition is raised synchronously at the point of violation;
//! there is no deferred or batched validation. Unknown-but-harmless input
//! (extra constructor keys) is deliberately *not* an error -- see
//! [`Entity::warnings`](crate::entity::Entity::warnings).

use fabricator_data::SignalKind;

use crate::blueprint::EntityRef;

// ---------------------------------------------------------------------------
// Entity model errors
// ---------------------------------------------------------------------------

/// Errors raised while constructing or mutating an entity.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// The name is not in the closed set for the entity's prototype class.
    #[error("'{0}' is not a valid name for this entity class")]
    UnknownEntityName(String),

    /// A field's value violates its shape/type/range constraint.
    #[error("invalid value for field '{field}': {reason}")]
    Schema { field: &'static str, reason: String },

    /// Unrecognized comparator symbol in a decider condition.
    #[error("unknown comparator '{0}'")]
    UnknownComparator(String),

    /// Unrecognized operator symbol in an arithmetic condition.
    #[error("unknown arithmetic operator '{0}'")]
    UnknownOperator(String),

    /// Signal name not present in the game-data tables.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// Signal name resolves to more than one kind; the caller must pick one.
    #[error("signal '{name}' is ambiguous across kinds {kinds:?}")]
    AmbiguousSignal {
        name: String,
        kinds: Vec<SignalKind>,
    },
}

// ---------------------------------------------------------------------------
// Blueprint graph errors
// ---------------------------------------------------------------------------

/// Errors raised by blueprint graph operations. Graph state is unchanged
/// whenever one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// The string id is already attached to another entity.
    #[error("duplicate entity id '{0}'")]
    DuplicateId(String),

    /// A connection reference did not resolve to any entity.
    #[error("no entity in blueprint matching {0}")]
    EntityNotFound(EntityRef),

    /// The entity cannot participate in circuit connections at all.
    #[error("'{0}' is not circuit connectable")]
    NotCircuitConnectable(String),

    /// A circuit id was given for an entity with a single connection point.
    #[error("'{name}' has a single circuit connection point; circuit id {given} is not valid")]
    NotDualCircuitConnectable { name: String, given: u8 },

    /// Circuit ids are 1 (input) or 2 (output).
    #[error("circuit id must be 1 or 2, got {0}")]
    InvalidCircuitId(u8),

    /// The entity cannot participate in power connections.
    #[error("'{0}' is not power connectable")]
    NotPowerConnectable(String),

    /// A power side was given for an entity with a single power pole.
    #[error("'{name}' has a single power pole; side {given} is not valid")]
    NotDualPowerConnectable { name: String, given: u8 },

    /// Power sides are 0 or 1.
    #[error("power side must be 0 or 1, got {0}")]
    InvalidPowerSide(u8),

    /// Both endpoints resolve to the same connection point.
    #[error("cannot connect an entity's connection point to itself")]
    SelfConnection,

    #[error(transparent)]
    Entity(#[from] EntityError),
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Errors raised while exporting a blueprint string.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

/// Errors raised while importing a blueprint string.
///
/// Each decode layer maps to its own variant so callers can present a
/// clean message instead of a low-level transport error.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("blueprint string is empty")]
    Empty,

    /// The leading version byte is not one this library understands.
    #[error("unsupported blueprint string version marker '{0}'")]
    UnsupportedVersion(char),

    #[error("malformed base64 payload: {0}")]
    Base64(String),

    #[error("malformed compressed payload: {0}")]
    Inflate(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    /// The decoded JSON does not have the expected blueprint structure.
    #[error("invalid blueprint structure: {0}")]
    Structure(String),

    /// Re-running construction validation on a decoded entity failed.
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Rebuilding the connection graph from decoded edges failed.
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
}

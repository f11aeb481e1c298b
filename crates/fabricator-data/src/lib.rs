//! Static game-data tables for the fabricator blueprint library.
//!
//! Provides the read-only lookup tables that entity construction and
//! blueprint validation check against: item definitions (stack sizes),
//! signal definitions (name -> kind), and entity prototypes (class
//! membership, tile dimensions, connection capability flags).
//!
//! Tables are built through [`GameDataBuilder`] and frozen into an
//! immutable [`GameData`] before any entity is constructed. Population is
//! either programmatic, via the file loader in [`loader`], or via the
//! compact [`GameData::builtin`] dataset used by tests and examples.

pub mod loader;
pub mod schema;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while building a [`GameData`] table set.
#[derive(Debug, thiserror::Error)]
pub enum GameDataError {
    #[error("duplicate item definition '{0}'")]
    DuplicateItem(String),
    #[error("duplicate signal definition '{0}' with kind {1:?}")]
    DuplicateSignal(String, SignalKind),
    #[error("duplicate prototype definition '{0}'")]
    DuplicatePrototype(String),
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// The kind of quantity a signal carries over a circuit network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Item,
    Virtual,
    Fluid,
}

/// An item definition: a placeable or transportable thing with a stack size.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub stack_size: u32,
}

/// A signal definition. Every registered item implicitly defines an
/// item-kind signal of the same name; virtual and fluid signals are
/// registered explicitly.
#[derive(Debug, Clone)]
pub struct SignalDef {
    pub name: String,
    pub kind: SignalKind,
}

/// Connection capability flags for a prototype class.
///
/// Each prototype carries a flat flag set resolved once at registration
/// time; graph operations gate on these instead of on class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    /// Can participate in power (copper wire) connections.
    pub power_connectable: bool,
    /// Exposes two independent power poles (e.g. a power switch).
    pub dual_power_connectable: bool,
    /// Can participate in circuit (red/green wire) connections.
    pub circuit_connectable: bool,
    /// Exposes two circuit connection points disambiguated by circuit id
    /// (e.g. combinator input vs. output).
    pub dual_circuit_connectable: bool,
}

/// An entity prototype: the static description of one placeable name.
#[derive(Debug, Clone)]
pub struct PrototypeDef {
    pub name: String,
    /// The closed class set this name belongs to, e.g. `"container"`,
    /// `"decider-combinator"`, `"reactor"`.
    pub class: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub flags: CapabilityFlags,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for an immutable [`GameData`].
/// Two-phase lifecycle: registration, then finalization via [`build`].
///
/// [`build`]: GameDataBuilder::build
#[derive(Debug, Default)]
pub struct GameDataBuilder {
    items: Vec<ItemDef>,
    item_index: HashMap<String, usize>,
    signals: Vec<SignalDef>,
    signal_kinds: HashMap<String, Vec<SignalKind>>,
    prototypes: Vec<PrototypeDef>,
    prototype_index: HashMap<String, usize>,
}

impl GameDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. Also registers the item-kind signal of the same
    /// name, since any item can be carried on a circuit network.
    pub fn register_item(&mut self, name: &str, stack_size: u32) -> Result<(), GameDataError> {
        if self.item_index.contains_key(name) {
            return Err(GameDataError::DuplicateItem(name.to_string()));
        }
        self.item_index.insert(name.to_string(), self.items.len());
        self.items.push(ItemDef {
            name: name.to_string(),
            stack_size,
        });
        self.register_signal(name, SignalKind::Item)
    }

    /// Register a signal under the given kind.
    pub fn register_signal(&mut self, name: &str, kind: SignalKind) -> Result<(), GameDataError> {
        let kinds = self.signal_kinds.entry(name.to_string()).or_default();
        if kinds.contains(&kind) {
            return Err(GameDataError::DuplicateSignal(name.to_string(), kind));
        }
        kinds.push(kind);
        self.signals.push(SignalDef {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    /// Register an entity prototype.
    pub fn register_prototype(
        &mut self,
        name: &str,
        class: &str,
        tile_width: u32,
        tile_height: u32,
        flags: CapabilityFlags,
    ) -> Result<(), GameDataError> {
        if self.prototype_index.contains_key(name) {
            return Err(GameDataError::DuplicatePrototype(name.to_string()));
        }
        self.prototype_index
            .insert(name.to_string(), self.prototypes.len());
        self.prototypes.push(PrototypeDef {
            name: name.to_string(),
            class: class.to_string(),
            tile_width,
            tile_height,
            flags,
        });
        Ok(())
    }

    /// Finalize the tables into an immutable [`GameData`].
    pub fn build(self) -> GameData {
        let mut classes: HashMap<String, Vec<String>> = HashMap::new();
        for proto in &self.prototypes {
            classes
                .entry(proto.class.clone())
                .or_default()
                .push(proto.name.clone());
        }
        GameData {
            items: self.items,
            item_index: self.item_index,
            signal_kinds: self.signal_kinds,
            prototypes: self.prototypes,
            prototype_index: self.prototype_index,
            classes,
        }
    }
}

// ---------------------------------------------------------------------------
// GameData
// ---------------------------------------------------------------------------

/// Immutable game-data tables. Frozen at startup; all blueprint and entity
/// construction borrows it read-only, so concurrent readers are safe.
#[derive(Debug)]
pub struct GameData {
    items: Vec<ItemDef>,
    item_index: HashMap<String, usize>,
    signal_kinds: HashMap<String, Vec<SignalKind>>,
    prototypes: Vec<PrototypeDef>,
    prototype_index: HashMap<String, usize>,
    classes: HashMap<String, Vec<String>>,
}

impl GameData {
    /// Stack size of an item, or `None` if the name is not a known item.
    pub fn stack_size(&self, name: &str) -> Option<u32> {
        self.item_index
            .get(name)
            .map(|&i| self.items[i].stack_size)
    }

    /// Whether the name is a known item.
    pub fn is_item(&self, name: &str) -> bool {
        self.item_index.contains_key(name)
    }

    /// All signal kinds a name resolves to. Empty if unknown; more than
    /// one entry means the name is ambiguous without an explicit kind.
    pub fn signal_kinds(&self, name: &str) -> &[SignalKind] {
        self.signal_kinds.get(name).map_or(&[], Vec::as_slice)
    }

    /// Prototype definition for an entity name.
    pub fn prototype(&self, name: &str) -> Option<&PrototypeDef> {
        self.prototype_index.get(name).map(|&i| &self.prototypes[i])
    }

    /// All names registered under a prototype class, in registration order.
    pub fn class_members(&self, class: &str) -> &[String] {
        self.classes.get(class).map_or(&[], Vec::as_slice)
    }

    /// Whether `name` belongs to the closed set of prototype `class`.
    pub fn is_class_member(&self, class: &str, name: &str) -> bool {
        self.prototype(name).is_some_and(|p| p.class == class)
    }

    /// Iterate over all items in registration order.
    pub fn items(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.iter()
    }

    /// A compact built-in dataset covering the prototype classes the core
    /// library exercises. Real deployments load full datasets through
    /// [`loader::load_game_data`].
    pub fn builtin() -> GameData {
        let mut b = GameDataBuilder::new();

        let items: &[(&str, u32)] = &[
            ("iron-ore", 50),
            ("copper-ore", 50),
            ("iron-plate", 100),
            ("copper-plate", 100),
            ("iron-gear-wheel", 100),
            ("electronic-circuit", 200),
            ("uranium-fuel-cell", 50),
        ];
        for &(name, stack) in items {
            b.register_item(name, stack).expect("builtin items are unique");
        }

        for name in ["signal-A", "signal-B", "signal-C", "signal-D", "signal-E"] {
            b.register_signal(name, SignalKind::Virtual)
                .expect("builtin signals are unique");
        }
        for name in ["signal-everything", "signal-anything", "signal-each"] {
            b.register_signal(name, SignalKind::Virtual)
                .expect("builtin signals are unique");
        }
        for name in ["water", "crude-oil", "steam"] {
            b.register_signal(name, SignalKind::Fluid)
                .expect("builtin signals are unique");
        }

        let chest = CapabilityFlags {
            circuit_connectable: true,
            ..CapabilityFlags::default()
        };
        let combinator = CapabilityFlags {
            circuit_connectable: true,
            dual_circuit_connectable: true,
            ..CapabilityFlags::default()
        };
        let pole = CapabilityFlags {
            power_connectable: true,
            circuit_connectable: true,
            ..CapabilityFlags::default()
        };
        let switch = CapabilityFlags {
            power_connectable: true,
            dual_power_connectable: true,
            circuit_connectable: true,
            ..CapabilityFlags::default()
        };

        let prototypes: &[(&str, &str, u32, u32, CapabilityFlags)] = &[
            ("wooden-chest", "container", 1, 1, chest),
            ("iron-chest", "container", 1, 1, chest),
            ("steel-chest", "container", 1, 1, chest),
            ("logistic-chest-buffer", "logistic-buffer-container", 1, 1, chest),
            ("logistic-chest-requester", "logistic-requester-container", 1, 1, chest),
            ("logistic-chest-storage", "logistic-storage-container", 1, 1, chest),
            ("decider-combinator", "decider-combinator", 1, 2, combinator),
            ("arithmetic-combinator", "arithmetic-combinator", 1, 2, combinator),
            ("constant-combinator", "constant-combinator", 1, 1, chest),
            ("small-electric-pole", "electric-pole", 1, 1, pole),
            ("medium-electric-pole", "electric-pole", 1, 1, pole),
            ("big-electric-pole", "electric-pole", 2, 2, pole),
            ("power-switch", "power-switch", 2, 2, switch),
            ("nuclear-reactor", "reactor", 5, 5, CapabilityFlags::default()),
            ("assembling-machine-1", "assembling-machine", 3, 3, CapabilityFlags::default()),
        ];
        for &(name, class, w, h, flags) in prototypes {
            b.register_prototype(name, class, w, h, flags)
                .expect("builtin prototypes are unique");
        }

        b.build()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

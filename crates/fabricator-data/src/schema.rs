//! Serde data file structs for game content definitions.
//!
//! These structs define the on-disk format for items, signals, and entity
//! prototypes. They are deserialized from RON, JSON, or TOML data files and
//! then registered into a [`GameDataBuilder`] by the loader.
//!
//! [`GameDataBuilder`]: crate::GameDataBuilder

use serde::Deserialize;

use crate::{CapabilityFlags, SignalKind};

// ===========================================================================
// Items
// ===========================================================================

/// An item definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
}

fn default_stack_size() -> u32 {
    50
}

// ===========================================================================
// Signals
// ===========================================================================

/// A virtual or fluid signal definition in a data file. Item signals are
/// implied by item definitions and must not be listed here.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
}

// ===========================================================================
// Prototypes
// ===========================================================================

/// An entity prototype definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct PrototypeData {
    pub name: String,
    pub class: String,
    #[serde(default = "default_tile_dim")]
    pub tile_width: u32,
    #[serde(default = "default_tile_dim")]
    pub tile_height: u32,
    #[serde(default)]
    pub power_connectable: bool,
    #[serde(default)]
    pub dual_power_connectable: bool,
    #[serde(default)]
    pub circuit_connectable: bool,
    #[serde(default)]
    pub dual_circuit_connectable: bool,
}

fn default_tile_dim() -> u32 {
    1
}

impl PrototypeData {
    /// Collapse the per-field booleans into the resolved flag set.
    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            power_connectable: self.power_connectable,
            dual_power_connectable: self.dual_power_connectable,
            circuit_connectable: self.circuit_connectable,
            dual_circuit_connectable: self.dual_circuit_connectable,
        }
    }
}

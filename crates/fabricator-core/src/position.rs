//! Grid positions for placed entities.
//!
//! The exchange format accepts positions either as a `[x, y]` pair or as an
//! `{"x": .., "y": ..}` mapping; output always uses the mapping form.
//! Entities are usually placed by grid cell and snapped to the center of
//! their tile footprint.

use serde::{Deserialize, Serialize};

/// A position on the blueprint grid, in tiles. Fractional values place an
/// entity off the cell boundary (the center of a 1x1 entity in cell (0,0)
/// is `{x: 0.5, y: 0.5}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PositionRepr")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Accepted input shapes: `[x, y]` or `{x, y}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PositionRepr {
    Pair(f64, f64),
    Map { x: f64, y: f64 },
}

impl From<PositionRepr> for Position {
    fn from(repr: PositionRepr) -> Self {
        match repr {
            PositionRepr::Pair(x, y) => Position { x, y },
            PositionRepr::Map { x, y } => Position { x, y },
        }
    }
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// The center of a `tile_width` x `tile_height` footprint whose
    /// top-left tile is grid cell `(gx, gy)`.
    pub fn centered(gx: i64, gy: i64, tile_width: u32, tile_height: u32) -> Self {
        Position {
            x: gx as f64 + f64::from(tile_width) / 2.0,
            y: gy as f64 + f64::from(tile_height) / 2.0,
        }
    }

    /// Whether both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { x: 0.0, y: 0.0 }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

//! Entity orientations.

use serde::{Deserialize, Serialize};

/// One of the eight placement orientations. Serialized as the wire value
/// (0..=7); `North` is the identity orientation and is omitted from
/// exported entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    #[default]
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        d as u8
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::North),
            1 => Ok(Direction::NorthEast),
            2 => Ok(Direction::East),
            3 => Ok(Direction::SouthEast),
            4 => Ok(Direction::South),
            5 => Ok(Direction::SouthWest),
            6 => Ok(Direction::West),
            7 => Ok(Direction::NorthWest),
            other => Err(format!("direction must be 0..=7, got {other}")),
        }
    }
}

impl Direction {
    /// The orientation rotated by 180 degrees.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_north() {
        assert_eq!(Direction::default(), Direction::North);
    }

    #[test]
    fn serializes_as_wire_value() {
        assert_eq!(serde_json::to_string(&Direction::East).unwrap(), "2");
        let d: Direction = serde_json::from_str("6").unwrap();
        assert_eq!(d, Direction::West);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(serde_json::from_str::<Direction>("8").is_err());
    }

    #[test]
    fn opposite_wraps() {
        assert_eq!(Direction::North.opposite(), Direction::South);
        assert_eq!(Direction::SouthWest.opposite(), Direction::NorthEast);
    }
}

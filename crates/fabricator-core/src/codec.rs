//! The blueprint-string codec.
//!
//! A blueprint string is a one-byte version marker (`'0'`) followed by the
//! base64 encoding of the zlib-compressed canonical JSON structure. Export
//! always emits sorted object keys, so equal blueprints produce identical
//! strings. Import reverses each layer and maps every failure to a
//! dedicated [`ImportError`] variant; an unrecognized version marker is
//! rejected outright, while unknown keys inside the payload are preserved.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fabricator_data::GameData;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::blueprint::Blueprint;
use crate::error::{ExportError, ImportError};

/// The only envelope version this library understands.
const VERSION_MARKER: char = '0';

/// Export a blueprint as a portable exchange string.
pub fn to_string(blueprint: &Blueprint) -> Result<String, ExportError> {
    let value = blueprint.to_value()?;
    let json = serde_json::to_vec(&value)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let mut out = String::with_capacity(compressed.len() * 4 / 3 + 4);
    out.push(VERSION_MARKER);
    out.push_str(&STANDARD.encode(&compressed));
    Ok(out)
}

/// Import an exchange string, re-running full construction validation on
/// every decoded entity and edge. Leading/trailing whitespace is ignored.
pub fn from_string(data: &GameData, s: &str) -> Result<Blueprint, ImportError> {
    let mut chars = s.trim().chars();
    let marker = chars.next().ok_or(ImportError::Empty)?;
    if marker != VERSION_MARKER {
        return Err(ImportError::UnsupportedVersion(marker));
    }

    let compressed = STANDARD
        .decode(chars.as_str())
        .map_err(|e| ImportError::Base64(e.to_string()))?;

    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| ImportError::Inflate(e.to_string()))?;

    let value: serde_json::Value =
        serde_json::from_slice(&json).map_err(|e| ImportError::Json(e.to_string()))?;
    Blueprint::from_value(data, &value)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::WireColor;
    use crate::entity::Entity;

    fn encode_raw(payload: &[u8]) -> String {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(payload).unwrap();
        format!("0{}", STANDARD.encode(encoder.finish().unwrap()))
    }

    #[test]
    fn empty_blueprint_round_trips() {
        let data = GameData::builtin();
        let bp = Blueprint::new();
        let s = to_string(&bp).unwrap();
        assert!(s.starts_with('0'));
        let rebuilt = from_string(&data, &s).unwrap();
        assert_eq!(rebuilt, bp);
        assert!(rebuilt.is_empty());
    }

    #[test]
    fn populated_blueprint_round_trips() {
        let data = GameData::builtin();
        let mut bp = Blueprint::new();
        bp.set_label(Some("smelter feed"));
        bp.set_icons(&data, &["signal-A"]).unwrap();

        let mut combinator = Entity::new(&data, "decider-combinator").unwrap();
        combinator.set_grid_position(0, 0);
        combinator
            .set_decider_conditions(
                Some(crate::condition::Operand::signal(&data, "iron-ore").unwrap()),
                Some(">="),
                Some(crate::condition::Operand::Constant(100)),
                None,
            )
            .unwrap();
        bp.add_entity_with_id(combinator, "dc").unwrap();

        let mut chest = Entity::new(&data, "steel-chest").unwrap();
        chest.set_grid_position(2, 0);
        bp.add_entity(chest);
        bp.add_circuit_connection_at(WireColor::Red, "dc", 1, 1, 1)
            .unwrap();

        let rebuilt = from_string(&data, &to_string(&bp).unwrap()).unwrap();
        assert_eq!(rebuilt, bp);
        assert_eq!(rebuilt.label(), Some("smelter feed"));
        assert_eq!(
            rebuilt.circuit_connections(0, 1, WireColor::Red).unwrap().len(),
            1
        );
    }

    #[test]
    fn export_is_deterministic() {
        let data = GameData::builtin();
        let mut bp = Blueprint::new();
        bp.add_entity(Entity::new(&data, "wooden-chest").unwrap());
        assert_eq!(to_string(&bp).unwrap(), to_string(&bp).unwrap());
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let data = GameData::builtin();
        let s = format!("  {}\n", to_string(&Blueprint::new()).unwrap());
        assert!(from_string(&data, &s).is_ok());
    }

    #[test]
    fn empty_input_rejected() {
        let data = GameData::builtin();
        assert!(matches!(from_string(&data, ""), Err(ImportError::Empty)));
        assert!(matches!(from_string(&data, "   "), Err(ImportError::Empty)));
    }

    #[test]
    fn unknown_version_marker_rejected() {
        let data = GameData::builtin();
        assert!(matches!(
            from_string(&data, "1eNqrVkrKKU0tLlGyqlZKzs8rKcrPLVWyUqqu1VFQyiwuScxLTq1UslIyNDA0MDGqrQUAyAsN1g=="),
            Err(ImportError::UnsupportedVersion('1'))
        ));
    }

    #[test]
    fn decode_failures_map_to_layered_errors() {
        let data = GameData::builtin();
        // Not base64.
        assert!(matches!(
            from_string(&data, "0!!!not-base64!!!"),
            Err(ImportError::Base64(_))
        ));
        // Base64 of bytes that are not a zlib stream.
        let s = format!("0{}", STANDARD.encode(b"garbage payload"));
        assert!(matches!(from_string(&data, &s), Err(ImportError::Inflate(_))));
        // Valid zlib of bytes that are not JSON.
        let s = encode_raw(b"definitely not json");
        assert!(matches!(from_string(&data, &s), Err(ImportError::Json(_))));
        // Valid JSON without the expected structure.
        let s = encode_raw(br#"{"spaceship": {}}"#);
        assert!(matches!(from_string(&data, &s), Err(ImportError::Structure(_))));
    }

    #[test]
    fn unknown_entity_in_payload_is_fatal() {
        let data = GameData::builtin();
        let s = encode_raw(
            br#"{"blueprint": {"entities": [{"entity_number": 1, "name": "flux-capacitor", "position": [0, 0]}], "version": 0}}"#,
        );
        assert!(matches!(from_string(&data, &s), Err(ImportError::Entity(_))));
    }
}

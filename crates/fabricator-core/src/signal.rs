//! Signal references: a name plus the kind of network quantity it names.

use fabricator_data::{GameData, SignalKind};
use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// A reference to a signal: `(name, kind)`. The kind is inferred from the
/// game-data tables when the caller gives only a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalId {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
}

impl SignalId {
    pub fn new(name: impl Into<String>, kind: SignalKind) -> Self {
        SignalId {
            name: name.into(),
            kind,
        }
    }

    /// Resolve a bare name against the signal tables. Fails if the name is
    /// unknown, or known under more than one kind (the caller must then
    /// use [`SignalId::new`] with an explicit kind).
    pub fn resolve(data: &GameData, name: &str) -> Result<Self, EntityError> {
        match data.signal_kinds(name) {
            [] => Err(EntityError::UnknownSignal(name.to_string())),
            [kind] => Ok(SignalId::new(name, *kind)),
            kinds => Err(EntityError::AmbiguousSignal {
                name: name.to_string(),
                kinds: kinds.to_vec(),
            }),
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
    fn resolve_virtual_signal() {
        let data = GameData::builtin();
        let s = SignalId::resolve(&data, "signal-A").unwrap();
        assert_eq!(s, SignalId::new("signal-A", SignalKind::Virtual));
    }

    #[test]
    fn resolve_item_signal() {
        let data = GameData::builtin();
        let s = SignalId::resolve(&data, "iron-ore").unwrap();
        assert_eq!(s.kind, SignalKind::Item);
    }

    #[test]
    fn resolve_fluid_signal() {
        let data = GameData::builtin();
        let s = SignalId::resolve(&data, "water").unwrap();
        assert_eq!(s.kind, SignalKind::Fluid);
    }

    #[test]
    fn resolve_unknown_fails() {
        let data = GameData::builtin();
        assert!(matches!(
            SignalId::resolve(&data, "definitely-not-a-signal"),
            Err(EntityError::UnknownSignal(_))
        ));
    }

    #[test]
    fn resolve_ambiguous_fails() {
        let mut b = fabricator_data::GameDataBuilder::new();
        b.register_item("steam-barrel", 10).unwrap();
        b.register_signal("steam-barrel", SignalKind::Fluid).unwrap();
        let data = b.build();

        assert!(matches!(
            SignalId::resolve(&data, "steam-barrel"),
            Err(EntityError::AmbiguousSignal { .. })
        ));
        // An explicit kind still works.
        let s = SignalId::new("steam-barrel", SignalKind::Fluid);
        assert_eq!(s.kind, SignalKind::Fluid);
    }

    #[test]
    fn serializes_with_type_key() {
        let s = SignalId::new("signal-A", SignalKind::Virtual);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "signal-A", "type": "virtual"})
        );
    }
}

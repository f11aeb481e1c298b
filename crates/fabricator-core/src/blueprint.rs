//! The blueprint connection graph.
//!
//! A [`Blueprint`] owns an insertion-ordered list of entities and the wire
//! edges between them. Entities are addressed by numeric index (insertion
//! position) or by an explicit string id; both resolve to the same slot.
//! Every edge is mirrored: adding a red wire from A to B records the edge
//! in both adjacency sets, and removing an entity strips every edge that
//! references it. Validation runs on both endpoints before either side is
//! mutated, so a failed call leaves the graph unchanged.
//!
//! Circuit edges are keyed by connection point (1 = input, 2 = output; only
//! dual-circuit entities have a point 2) and wire color. Power edges are
//! keyed by pole side (0 or 1; only dual-power entities such as switches
//! have a side 1).

use std::collections::BTreeMap;

use fabricator_data::GameData;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;
use crate::error::{BlueprintError, ImportError};
use crate::signal::SignalId;

/// Version stamp for freshly constructed blueprints: game version 1.1.0.0
/// packed as four 16-bit fields, most significant first.
const DEFAULT_VERSION: u64 = (1 << 48) | (1 << 32);

// ---------------------------------------------------------------------------
// References and edge records
// ---------------------------------------------------------------------------

/// Circuit wire color. Red and green wires form independent networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WireColor {
    Red,
    Green,
}

impl WireColor {
    pub fn as_str(self) -> &'static str {
        match self {
            WireColor::Red => "red",
            WireColor::Green => "green",
        }
    }

    fn parse(s: &str) -> Option<WireColor> {
        match s {
            "red" => Some(WireColor::Red),
            "green" => Some(WireColor::Green),
            _ => None,
        }
    }
}

/// A reference to an entity in a blueprint: either its insertion index or
/// the string id it was added under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Index(usize),
    Id(String),
}

impl From<usize> for EntityRef {
    fn from(index: usize) -> Self {
        EntityRef::Index(index)
    }
}

impl From<&str> for EntityRef {
    fn from(id: &str) -> Self {
        EntityRef::Id(id.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(id: String) -> Self {
        EntityRef::Id(id)
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Index(i) => write!(f, "index {i}"),
            EntityRef::Id(id) => write!(f, "id '{id}'"),
        }
    }
}

/// One end of a circuit edge as stored in an adjacency list: the target's
/// index, plus the target's connection point when the target is
/// dual-circuit (single-point targets carry no disambiguator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub entity: usize,
    pub circuit_id: Option<u8>,
}

/// One end of a power edge: the target's index and pole side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTarget {
    pub entity: usize,
    pub side: u8,
}

/// A blueprint icon slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    pub signal: SignalId,
    /// 1-based icon slot.
    pub index: u16,
}

// ---------------------------------------------------------------------------
// Internal storage
// ---------------------------------------------------------------------------

/// An entity slot: the entity itself, its optional string id, and its
/// adjacency sets. Edge order within a list is insertion order.
#[derive(Debug, Clone)]
struct PlacedEntity {
    entity: Entity,
    id: Option<String>,
    circuit: BTreeMap<(u8, WireColor), Vec<ConnectionTarget>>,
    power: BTreeMap<u8, Vec<PowerTarget>>,
}

// String ids are construction-time aliases and do not survive export, so
// they are excluded from structural equality.
impl PartialEq for PlacedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
            && self.circuit == other.circuit
            && self.power == other.power
    }
}

impl PlacedEntity {
    fn new(entity: Entity, id: Option<String>) -> Self {
        PlacedEntity {
            entity,
            id,
            circuit: BTreeMap::new(),
            power: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// An ordered collection of placed entities plus their wiring, with
/// label/icon/version metadata. See the module docs for the edge model.
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    label: Option<String>,
    icons: Vec<Icon>,
    version: u64,
    entities: Vec<PlacedEntity>,
    ids: BTreeMap<String, usize>,
    /// Unrecognized top-level keys from imported data, preserved verbatim.
    extras: BTreeMap<String, Value>,
}

impl PartialEq for Blueprint {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.icons == other.icons
            && self.version == other.version
            && self.entities == other.entities
            && self.extras == other.extras
    }
}

impl Blueprint {
    pub fn new() -> Blueprint {
        Blueprint {
            version: DEFAULT_VERSION,
            ..Blueprint::default()
        }
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: Option<&str>) {
        self.label = label.map(str::to_string);
    }

    pub fn icons(&self) -> &[Icon] {
        &self.icons
    }

    /// Replace the icon list with the given signals, indexed 1, 2, 3, ...
    pub fn set_icons(&mut self, data: &GameData, names: &[&str]) -> Result<(), BlueprintError> {
        let mut icons = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            icons.push(Icon {
                signal: SignalId::resolve(data, name).map_err(BlueprintError::Entity)?,
                index: (i + 1) as u16,
            });
        }
        self.icons = icons;
        Ok(())
    }

    /// The packed game version stamp.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version stamp split into (major, minor, patch, dev).
    pub fn version_parts(&self) -> (u16, u16, u16, u16) {
        (
            (self.version >> 48) as u16,
            (self.version >> 32) as u16,
            (self.version >> 16) as u16,
            self.version as u16,
        )
    }

    pub fn set_version(&mut self, major: u16, minor: u16, patch: u16, dev: u16) {
        self.version = (u64::from(major) << 48)
            | (u64::from(minor) << 32)
            | (u64::from(patch) << 16)
            | u64::from(dev);
    }

    /// Unrecognized top-level keys retained from imported data.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    // -----------------------------------------------------------------------
    // Entity management
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Insert an entity, returning the index it is addressable under.
    pub fn add_entity(&mut self, entity: Entity) -> usize {
        let index = self.entities.len();
        self.entities.push(PlacedEntity::new(entity, None));
        index
    }

    /// Insert an entity under a string id (the index also works).
    pub fn add_entity_with_id(
        &mut self,
        entity: Entity,
        id: impl Into<String>,
    ) -> Result<usize, BlueprintError> {
        let id = id.into();
        if self.ids.contains_key(&id) {
            return Err(BlueprintError::DuplicateId(id));
        }
        let index = self.entities.len();
        self.entities
            .push(PlacedEntity::new(entity, Some(id.clone())));
        self.ids.insert(id, index);
        Ok(index)
    }

    /// Resolve an id or index to the entity slot it names.
    fn resolve(&self, r: EntityRef) -> Result<usize, BlueprintError> {
        match r {
            EntityRef::Index(i) => {
                if i < self.entities.len() {
                    Ok(i)
                } else {
                    Err(BlueprintError::EntityNotFound(EntityRef::Index(i)))
                }
            }
            EntityRef::Id(id) => match self.ids.get(&id) {
                Some(&i) => Ok(i),
                None => Err(BlueprintError::EntityNotFound(EntityRef::Id(id))),
            },
        }
    }

    pub fn entity(&self, r: impl Into<EntityRef>) -> Result<&Entity, BlueprintError> {
        let i = self.resolve(r.into())?;
        Ok(&self.entities[i].entity)
    }

    pub fn entity_mut(&mut self, r: impl Into<EntityRef>) -> Result<&mut Entity, BlueprintError> {
        let i = self.resolve(r.into())?;
        Ok(&mut self.entities[i].entity)
    }

    /// The string id of the entity at `index`, if it was added with one.
    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.entities.get(index).and_then(|p| p.id.as_deref())
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|p| &p.entity)
    }

    /// Remove an entity, strip every edge that references it, and renumber
    /// the stored indices of everything behind it. Returns the entity.
    pub fn remove_entity(&mut self, r: impl Into<EntityRef>) -> Result<Entity, BlueprintError> {
        let index = self.resolve(r.into())?;
        let removed = self.entities.remove(index);

        for placed in &mut self.entities {
            for targets in placed.circuit.values_mut() {
                targets.retain(|t| t.entity != index);
                for t in targets.iter_mut() {
                    if t.entity > index {
                        t.entity -= 1;
                    }
                }
            }
            placed.circuit.retain(|_, targets| !targets.is_empty());

            for links in placed.power.values_mut() {
                links.retain(|l| l.entity != index);
                for l in links.iter_mut() {
                    if l.entity > index {
                        l.entity -= 1;
                    }
                }
            }
            placed.power.retain(|_, links| !links.is_empty());
        }

        self.ids = self
            .entities
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.id.clone().map(|id| (id, i)))
            .collect();

        Ok(removed.entity)
    }

    // -----------------------------------------------------------------------
    // Circuit connections
    // -----------------------------------------------------------------------

    /// Connect two entities with a circuit wire at their first connection
    /// point. For dual-circuit endpoints use
    /// [`add_circuit_connection_at`](Blueprint::add_circuit_connection_at).
    pub fn add_circuit_connection(
        &mut self,
        color: WireColor,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
    ) -> Result<(), BlueprintError> {
        self.add_circuit_connection_at(color, a, 1, b, 1)
    }

    /// Connect two entities with a circuit wire at explicit connection
    /// points (1 = input, 2 = output). Both endpoints are validated before
    /// either adjacency set is touched; re-adding an existing edge is a
    /// no-op.
    pub fn add_circuit_connection_at(
        &mut self,
        color: WireColor,
        a: impl Into<EntityRef>,
        side_a: u8,
        b: impl Into<EntityRef>,
        side_b: u8,
    ) -> Result<(), BlueprintError> {
        let ia = self.resolve(a.into())?;
        let ib = self.resolve(b.into())?;
        self.check_circuit_endpoint(ia, side_a)?;
        self.check_circuit_endpoint(ib, side_b)?;
        if ia == ib && side_a == side_b {
            return Err(BlueprintError::SelfConnection);
        }

        let toward_b = ConnectionTarget {
            entity: ib,
            circuit_id: self.entities[ib]
                .entity
                .dual_circuit_connectable()
                .then_some(side_b),
        };
        let toward_a = ConnectionTarget {
            entity: ia,
            circuit_id: self.entities[ia]
                .entity
                .dual_circuit_connectable()
                .then_some(side_a),
        };

        Self::insert_circuit(&mut self.entities[ia], side_a, color, toward_b);
        Self::insert_circuit(&mut self.entities[ib], side_b, color, toward_a);
        Ok(())
    }

    /// Remove the circuit edge between two first connection points.
    pub fn remove_circuit_connection(
        &mut self,
        color: WireColor,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
    ) -> Result<(), BlueprintError> {
        self.remove_circuit_connection_at(color, a, 1, b, 1)
    }

    /// Remove a circuit edge; removing an edge that does not exist is a
    /// no-op. Both sides of the mirror are dropped together.
    pub fn remove_circuit_connection_at(
        &mut self,
        color: WireColor,
        a: impl Into<EntityRef>,
        side_a: u8,
        b: impl Into<EntityRef>,
        side_b: u8,
    ) -> Result<(), BlueprintError> {
        let ia = self.resolve(a.into())?;
        let ib = self.resolve(b.into())?;
        self.check_circuit_endpoint(ia, side_a)?;
        self.check_circuit_endpoint(ib, side_b)?;

        Self::remove_circuit(&mut self.entities[ia], side_a, color, ib);
        Self::remove_circuit(&mut self.entities[ib], side_b, color, ia);
        Ok(())
    }

    /// The circuit adjacency list of one connection point and color.
    pub fn circuit_connections(
        &self,
        r: impl Into<EntityRef>,
        side: u8,
        color: WireColor,
    ) -> Result<&[ConnectionTarget], BlueprintError> {
        let i = self.resolve(r.into())?;
        Ok(self.entities[i]
            .circuit
            .get(&(side, color))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn check_circuit_endpoint(&self, index: usize, side: u8) -> Result<(), BlueprintError> {
        let entity = &self.entities[index].entity;
        if !entity.circuit_connectable() {
            return Err(BlueprintError::NotCircuitConnectable(
                entity.name().to_string(),
            ));
        }
        if !(1..=2).contains(&side) {
            return Err(BlueprintError::InvalidCircuitId(side));
        }
        if side == 2 && !entity.dual_circuit_connectable() {
            return Err(BlueprintError::NotDualCircuitConnectable {
                name: entity.name().to_string(),
                given: side,
            });
        }
        Ok(())
    }

    fn insert_circuit(placed: &mut PlacedEntity, side: u8, color: WireColor, target: ConnectionTarget) {
        let targets = placed.circuit.entry((side, color)).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    fn remove_circuit(placed: &mut PlacedEntity, side: u8, color: WireColor, other: usize) {
        if let Some(targets) = placed.circuit.get_mut(&(side, color)) {
            targets.retain(|t| t.entity != other);
            if targets.is_empty() {
                placed.circuit.remove(&(side, color));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Power connections
    // -----------------------------------------------------------------------

    /// Connect two power-connectable entities at their first pole side.
    pub fn add_power_connection(
        &mut self,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
    ) -> Result<(), BlueprintError> {
        self.add_power_connection_at(a, 0, b, 0)
    }

    /// Connect two entities with a copper wire at explicit pole sides
    /// (0 or 1; only dual-power entities have a side 1). Mirrored and
    /// idempotent like circuit edges.
    pub fn add_power_connection_at(
        &mut self,
        a: impl Into<EntityRef>,
        side_a: u8,
        b: impl Into<EntityRef>,
        side_b: u8,
    ) -> Result<(), BlueprintError> {
        let ia = self.resolve(a.into())?;
        let ib = self.resolve(b.into())?;
        self.check_power_endpoint(ia, side_a)?;
        self.check_power_endpoint(ib, side_b)?;
        if ia == ib && side_a == side_b {
            return Err(BlueprintError::SelfConnection);
        }

        Self::insert_power(&mut self.entities[ia], side_a, PowerTarget { entity: ib, side: side_b });
        Self::insert_power(&mut self.entities[ib], side_b, PowerTarget { entity: ia, side: side_a });
        Ok(())
    }

    pub fn remove_power_connection(
        &mut self,
        a: impl Into<EntityRef>,
        b: impl Into<EntityRef>,
    ) -> Result<(), BlueprintError> {
        self.remove_power_connection_at(a, 0, b, 0)
    }

    pub fn remove_power_connection_at(
        &mut self,
        a: impl Into<EntityRef>,
        side_a: u8,
        b: impl Into<EntityRef>,
        side_b: u8,
    ) -> Result<(), BlueprintError> {
        let ia = self.resolve(a.into())?;
        let ib = self.resolve(b.into())?;
        self.check_power_endpoint(ia, side_a)?;
        self.check_power_endpoint(ib, side_b)?;

        Self::remove_power(&mut self.entities[ia], side_a, ib);
        Self::remove_power(&mut self.entities[ib], side_b, ia);
        Ok(())
    }

    /// The power adjacency list of one pole side.
    pub fn power_connections(
        &self,
        r: impl Into<EntityRef>,
        side: u8,
    ) -> Result<&[PowerTarget], BlueprintError> {
        let i = self.resolve(r.into())?;
        Ok(self.entities[i]
            .power
            .get(&side)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn check_power_endpoint(&self, index: usize, side: u8) -> Result<(), BlueprintError> {
        let entity = &self.entities[index].entity;
        if !entity.power_connectable() {
            return Err(BlueprintError::NotPowerConnectable(
                entity.name().to_string(),
            ));
        }
        if side > 1 {
            return Err(BlueprintError::InvalidPowerSide(side));
        }
        if side == 1 && !entity.dual_power_connectable() {
            return Err(BlueprintError::NotDualPowerConnectable {
                name: entity.name().to_string(),
                given: side,
            });
        }
        Ok(())
    }

    fn insert_power(placed: &mut PlacedEntity, side: u8, target: PowerTarget) {
        let links = placed.power.entry(side).or_default();
        if !links.contains(&target) {
            links.push(target);
        }
    }

    fn remove_power(placed: &mut PlacedEntity, side: u8, other: usize) {
        if let Some(links) = placed.power.get_mut(&side) {
            links.retain(|l| l.entity != other);
            if links.is_empty() {
                placed.power.remove(&side);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// The exchange-format JSON structure: a `{"blueprint": {...}}` root
    /// with entities in insertion order numbered from 1, minimal entity
    /// maps, and connections in the game's keying scheme. Keys come out
    /// sorted, so equal blueprints produce byte-identical JSON.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut bp = serde_json::Map::new();
        bp.insert("item".to_string(), Value::String("blueprint".to_string()));
        if let Some(ref label) = self.label {
            bp.insert("label".to_string(), Value::String(label.clone()));
        }
        if !self.icons.is_empty() {
            bp.insert("icons".to_string(), serde_json::to_value(&self.icons)?);
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        for (index, placed) in self.entities.iter().enumerate() {
            let mut map = placed.entity.to_map()?;
            map.insert("entity_number".to_string(), Value::from(index + 1));
            if let Some(connections) = self.connections_value(placed) {
                map.insert("connections".to_string(), connections);
            }
            if let Some(neighbours) = Self::neighbours_value(placed) {
                map.insert("neighbours".to_string(), neighbours);
            }
            entities.push(Value::Object(map));
        }
        bp.insert("entities".to_string(), Value::Array(entities));
        bp.insert("version".to_string(), Value::from(self.version));
        for (key, value) in &self.extras {
            bp.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let mut root = serde_json::Map::new();
        root.insert("blueprint".to_string(), Value::Object(bp));
        Ok(Value::Object(root))
    }

    /// The `connections` map of one entity: circuit points keyed `"1"`/`"2"`
    /// with per-color target lists, and `"Cu0"`/`"Cu1"` copper entries for
    /// dual-power entities (which own the edge; the plain pole does not
    /// repeat it).
    fn connections_value(&self, placed: &PlacedEntity) -> Option<Value> {
        let mut conn = serde_json::Map::new();

        for (&(side, color), targets) in &placed.circuit {
            if targets.is_empty() {
                continue;
            }
            let entries: Vec<Value> = targets
                .iter()
                .map(|t| {
                    let mut m = serde_json::Map::new();
                    m.insert("entity_id".to_string(), Value::from(t.entity + 1));
                    if let Some(cid) = t.circuit_id {
                        m.insert("circuit_id".to_string(), Value::from(cid));
                    }
                    Value::Object(m)
                })
                .collect();
            let side_entry = conn
                .entry(side.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(side_map) = side_entry {
                side_map.insert(color.as_str().to_string(), Value::Array(entries));
            }
        }

        if placed.entity.dual_power_connectable() {
            for (&side, links) in &placed.power {
                if links.is_empty() {
                    continue;
                }
                let entries: Vec<Value> = links
                    .iter()
                    .map(|l| {
                        let mut m = serde_json::Map::new();
                        m.insert("entity_id".to_string(), Value::from(l.entity + 1));
                        m.insert("wire_id".to_string(), Value::from(l.side));
                        Value::Object(m)
                    })
                    .collect();
                conn.insert(format!("Cu{side}"), Value::Array(entries));
            }
        }

        if conn.is_empty() {
            None
        } else {
            Some(Value::Object(conn))
        }
    }

    /// The `neighbours` list of a plain power pole: copper links to other
    /// plain poles, as 1-based entity numbers. Links to dual-power
    /// entities are emitted on the dual side only.
    fn neighbours_value(placed: &PlacedEntity) -> Option<Value> {
        if !placed.entity.power_connectable() || placed.entity.dual_power_connectable() {
            return None;
        }
        let links = placed.power.get(&0)?;
        let neighbours: Vec<Value> = links
            .iter()
            .filter(|l| l.side == 0)
            .map(|l| Value::from(l.entity + 1))
            .collect();
        if neighbours.is_empty() {
            None
        } else {
            Some(Value::Array(neighbours))
        }
    }

    /// Rebuild a blueprint from the exchange-format JSON structure,
    /// re-running the same validation as manual construction. Unknown
    /// top-level keys are retained; malformed shapes fail with
    /// [`ImportError::Structure`].
    pub fn from_value(data: &GameData, value: &Value) -> Result<Blueprint, ImportError> {
        let root = value
            .as_object()
            .ok_or_else(|| ImportError::Structure("expected a JSON object at top level".into()))?;
        let bp = root
            .get("blueprint")
            .ok_or_else(|| ImportError::Structure("missing 'blueprint' key".into()))?
            .as_object()
            .ok_or_else(|| ImportError::Structure("'blueprint' must be an object".into()))?;

        let mut out = Blueprint::new();
        // Wiring is rebuilt after every entity exists; entity_number values
        // from the input are mapped back to insertion indices.
        let mut number_to_index: BTreeMap<u64, usize> = BTreeMap::new();
        let mut raw_edges: Vec<(usize, Option<Value>, Option<Value>)> = Vec::new();

        for (key, field) in bp {
            match key.as_str() {
                "item" => {}
                "label" => {
                    out.label = Some(
                        field
                            .as_str()
                            .ok_or_else(|| {
                                ImportError::Structure("'label' must be a string".into())
                            })?
                            .to_string(),
                    );
                }
                "icons" => {
                    out.icons = serde_json::from_value(field.clone())
                        .map_err(|e| ImportError::Structure(format!("invalid 'icons': {e}")))?;
                }
                "version" => {
                    out.version = field.as_u64().ok_or_else(|| {
                        ImportError::Structure("'version' must be an unsigned integer".into())
                    })?;
                }
                "entities" => {
                    let list = field.as_array().ok_or_else(|| {
                        ImportError::Structure("'entities' must be an array".into())
                    })?;
                    for entry in list {
                        let obj = entry.as_object().ok_or_else(|| {
                            ImportError::Structure("each entity must be an object".into())
                        })?;
                        let number =
                            obj.get("entity_number").and_then(Value::as_u64).ok_or_else(
                                || {
                                    ImportError::Structure(
                                        "entity missing 'entity_number'".into(),
                                    )
                                },
                            )?;
                        let mut fields = obj.clone();
                        fields.remove("entity_number");
                        let connections = fields.remove("connections");
                        let neighbours = fields.remove("neighbours");

                        let entity = Entity::from_value(data, &Value::Object(fields))?;
                        let index = out.add_entity(entity);
                        number_to_index.insert(number, index);
                        raw_edges.push((index, connections, neighbours));
                    }
                }
                unknown => {
                    tracing::warn!(key = %unknown, "unknown blueprint field retained");
                    out.extras.insert(unknown.to_string(), field.clone());
                }
            }
        }

        for (index, connections, neighbours) in raw_edges {
            if let Some(connections) = connections {
                out.restore_connections(index, &connections, &number_to_index)?;
            }
            if let Some(neighbours) = neighbours {
                let list = neighbours.as_array().ok_or_else(|| {
                    ImportError::Structure("'neighbours' must be an array".into())
                })?;
                for n in list {
                    let number = n.as_u64().ok_or_else(|| {
                        ImportError::Structure("'neighbours' entries must be integers".into())
                    })?;
                    let target = Self::lookup_number(&number_to_index, number)?;
                    // Neighbour lists appear on both poles; the mirrored
                    // insert deduplicates.
                    out.add_power_connection_at(index, 0, target, 0)?;
                }
            }
        }

        Ok(out)
    }

    fn restore_connections(
        &mut self,
        index: usize,
        connections: &Value,
        numbers: &BTreeMap<u64, usize>,
    ) -> Result<(), ImportError> {
        let conn = connections.as_object().ok_or_else(|| {
            ImportError::Structure("'connections' must be an object".into())
        })?;

        for (key, entry) in conn {
            match key.as_str() {
                "1" | "2" => {
                    let side: u8 = if key == "1" { 1 } else { 2 };
                    let colors = entry.as_object().ok_or_else(|| {
                        ImportError::Structure(format!(
                            "connection point '{key}' must be an object"
                        ))
                    })?;
                    for (color_key, targets) in colors {
                        let color = WireColor::parse(color_key).ok_or_else(|| {
                            ImportError::Structure(format!("unknown wire color '{color_key}'"))
                        })?;
                        let list = targets.as_array().ok_or_else(|| {
                            ImportError::Structure("wire targets must be an array".into())
                        })?;
                        for target in list {
                            let obj = target.as_object().ok_or_else(|| {
                                ImportError::Structure("wire target must be an object".into())
                            })?;
                            let number =
                                obj.get("entity_id").and_then(Value::as_u64).ok_or_else(
                                    || {
                                        ImportError::Structure(
                                            "wire target missing 'entity_id'".into(),
                                        )
                                    },
                                )?;
                            let circuit_id = match obj.get("circuit_id") {
                                None => 1,
                                Some(v) => v.as_u64().and_then(|n| u8::try_from(n).ok()).ok_or_else(
                                    || {
                                        ImportError::Structure(
                                            "'circuit_id' must be a small integer".into(),
                                        )
                                    },
                                )?,
                            };
                            let other = Self::lookup_number(numbers, number)?;
                            self.add_circuit_connection_at(color, index, side, other, circuit_id)?;
                        }
                    }
                }
                "Cu0" | "Cu1" => {
                    let side: u8 = if key == "Cu0" { 0 } else { 1 };
                    let list = entry.as_array().ok_or_else(|| {
                        ImportError::Structure(format!("'{key}' must be an array"))
                    })?;
                    for target in list {
                        let obj = target.as_object().ok_or_else(|| {
                            ImportError::Structure("copper target must be an object".into())
                        })?;
                        let number = obj.get("entity_id").and_then(Value::as_u64).ok_or_else(
                            || ImportError::Structure("copper target missing 'entity_id'".into()),
                        )?;
                        let wire_id = match obj.get("wire_id") {
                            None => 0,
                            Some(v) => v.as_u64().and_then(|n| u8::try_from(n).ok()).ok_or_else(
                                || {
                                    ImportError::Structure(
                                        "'wire_id' must be a small integer".into(),
                                    )
                                },
                            )?,
                        };
                        let other = Self::lookup_number(numbers, number)?;
                        self.add_power_connection_at(index, side, other, wire_id)?;
                    }
                }
                other => {
                    return Err(ImportError::Structure(format!(
                        "unknown connection key '{other}'"
                    )));
                }
            }
        }
        Ok(())
    }

    fn lookup_number(numbers: &BTreeMap<u64, usize>, number: u64) -> Result<usize, ImportError> {
        numbers.get(&number).copied().ok_or_else(|| {
            ImportError::Structure(format!(
                "connection references unknown entity_number {number}"
            ))
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> GameData {
        GameData::builtin()
    }

    fn chest(data: &GameData) -> Entity {
        Entity::new(data, "steel-chest").unwrap()
    }

    // -----------------------------------------------------------------------
    // Entity management
    // -----------------------------------------------------------------------

    #[test]
    fn index_and_id_resolve_to_same_slot() {
        let data = data();
        let mut bp = Blueprint::new();
        let idx = bp.add_entity_with_id(chest(&data), "box").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(bp.entity("box").unwrap().name(), "steel-chest");
        assert_eq!(bp.entity(0).unwrap().name(), "steel-chest");
        assert_eq!(bp.id_of(0), Some("box"));
    }

    #[test]
    fn duplicate_id_fails() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        assert!(matches!(
            bp.add_entity_with_id(chest(&data), "box"),
            Err(BlueprintError::DuplicateId(_))
        ));
        // The failed insert must not have grown the list.
        assert_eq!(bp.len(), 1);
    }

    #[test]
    fn missing_reference_fails() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity(chest(&data));
        assert!(matches!(
            bp.entity("nothing"),
            Err(BlueprintError::EntityNotFound(EntityRef::Id(_)))
        ));
        assert!(matches!(
            bp.entity(7),
            Err(BlueprintError::EntityNotFound(EntityRef::Index(7)))
        ));
    }

    #[test]
    fn entity_mut_allows_in_place_edits() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        bp.entity_mut("box").unwrap().set_grid_position(4, 2);
        assert_eq!(
            bp.entity("box").unwrap().position(),
            crate::position::Position::new(4.5, 2.5)
        );
    }

    // -----------------------------------------------------------------------
    // Circuit connections
    // -----------------------------------------------------------------------

    #[test]
    fn circuit_connection_is_mirrored() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        bp.add_entity_with_id(chest(&data), "b").unwrap();
        bp.add_circuit_connection(WireColor::Red, "a", "b").unwrap();

        let from_a = bp.circuit_connections("a", 1, WireColor::Red).unwrap();
        let from_b = bp.circuit_connections("b", 1, WireColor::Red).unwrap();
        assert_eq!(from_a, &[ConnectionTarget { entity: 1, circuit_id: None }]);
        assert_eq!(from_b, &[ConnectionTarget { entity: 0, circuit_id: None }]);
        // The green network is untouched.
        assert!(bp.circuit_connections("a", 1, WireColor::Green).unwrap().is_empty());
    }

    #[test]
    fn duplicate_edge_is_idempotent() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        bp.add_entity_with_id(chest(&data), "b").unwrap();
        bp.add_circuit_connection(WireColor::Red, "a", "b").unwrap();
        bp.add_circuit_connection(WireColor::Red, "a", "b").unwrap();
        bp.add_circuit_connection(WireColor::Red, "b", "a").unwrap();
        assert_eq!(bp.circuit_connections("a", 1, WireColor::Red).unwrap().len(), 1);
        assert_eq!(bp.circuit_connections("b", 1, WireColor::Red).unwrap().len(), 1);
    }

    #[test]
    fn dual_circuit_sides_carry_circuit_id() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "decider-combinator").unwrap(), "dc")
            .unwrap();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        // Chest into the combinator's input side.
        bp.add_circuit_connection_at(WireColor::Green, "box", 1, "dc", 1)
            .unwrap();

        // The chest records the combinator's point; the combinator records
        // the chest with no disambiguator (single-point target).
        assert_eq!(
            bp.circuit_connections("box", 1, WireColor::Green).unwrap(),
            &[ConnectionTarget { entity: 0, circuit_id: Some(1) }]
        );
        assert_eq!(
            bp.circuit_connections("dc", 1, WireColor::Green).unwrap(),
            &[ConnectionTarget { entity: 1, circuit_id: None }]
        );
    }

    #[test]
    fn combinator_input_to_own_output_is_allowed() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "arithmetic-combinator").unwrap(), "ac")
            .unwrap();
        bp.add_circuit_connection_at(WireColor::Red, "ac", 1, "ac", 2)
            .unwrap();
        assert_eq!(
            bp.circuit_connections("ac", 1, WireColor::Red).unwrap(),
            &[ConnectionTarget { entity: 0, circuit_id: Some(2) }]
        );
        assert_eq!(
            bp.circuit_connections("ac", 2, WireColor::Red).unwrap(),
            &[ConnectionTarget { entity: 0, circuit_id: Some(1) }]
        );
    }

    #[test]
    fn same_point_self_connection_rejected() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        assert!(matches!(
            bp.add_circuit_connection(WireColor::Red, "a", "a"),
            Err(BlueprintError::SelfConnection)
        ));
    }

    #[test]
    fn side_two_on_single_point_entity_rejected() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        bp.add_entity_with_id(chest(&data), "b").unwrap();
        assert!(matches!(
            bp.add_circuit_connection_at(WireColor::Red, "a", 1, "b", 2),
            Err(BlueprintError::NotDualCircuitConnectable { given: 2, .. })
        ));
        assert!(matches!(
            bp.add_circuit_connection_at(WireColor::Red, "a", 3, "b", 1),
            Err(BlueprintError::InvalidCircuitId(3))
        ));
    }

    #[test]
    fn non_circuit_entity_rejected() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "nuclear-reactor").unwrap(), "r")
            .unwrap();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        assert!(matches!(
            bp.add_circuit_connection(WireColor::Red, "r", "box"),
            Err(BlueprintError::NotCircuitConnectable(_))
        ));
    }

    #[test]
    fn failed_add_leaves_graph_unchanged() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        bp.add_entity_with_id(Entity::new(&data, "nuclear-reactor").unwrap(), "r")
            .unwrap();
        // Valid first endpoint, invalid second: nothing may be written.
        assert!(bp.add_circuit_connection(WireColor::Red, "a", "r").is_err());
        assert!(bp.circuit_connections("a", 1, WireColor::Red).unwrap().is_empty());
    }

    #[test]
    fn remove_circuit_connection_strips_both_sides() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap();
        bp.add_entity_with_id(chest(&data), "b").unwrap();
        bp.add_circuit_connection(WireColor::Red, "a", "b").unwrap();
        bp.remove_circuit_connection(WireColor::Red, "a", "b").unwrap();
        assert!(bp.circuit_connections("a", 1, WireColor::Red).unwrap().is_empty());
        assert!(bp.circuit_connections("b", 1, WireColor::Red).unwrap().is_empty());
        // Removing again is a no-op.
        bp.remove_circuit_connection(WireColor::Red, "b", "a").unwrap();
    }

    // -----------------------------------------------------------------------
    // Power connections
    // -----------------------------------------------------------------------

    #[test]
    fn power_connection_is_mirrored() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "small-electric-pole").unwrap(), "p1")
            .unwrap();
        bp.add_entity_with_id(Entity::new(&data, "medium-electric-pole").unwrap(), "p2")
            .unwrap();
        bp.add_power_connection("p1", "p2").unwrap();
        assert_eq!(
            bp.power_connections("p1", 0).unwrap(),
            &[PowerTarget { entity: 1, side: 0 }]
        );
        assert_eq!(
            bp.power_connections("p2", 0).unwrap(),
            &[PowerTarget { entity: 0, side: 0 }]
        );
    }

    #[test]
    fn power_switch_sides() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "power-switch").unwrap(), "sw")
            .unwrap();
        bp.add_entity_with_id(Entity::new(&data, "big-electric-pole").unwrap(), "pole")
            .unwrap();
        bp.add_power_connection_at("sw", 1, "pole", 0).unwrap();
        assert_eq!(
            bp.power_connections("sw", 1).unwrap(),
            &[PowerTarget { entity: 1, side: 0 }]
        );
        // Side 1 on a plain pole is invalid.
        assert!(matches!(
            bp.add_power_connection_at("pole", 1, "sw", 0),
            Err(BlueprintError::NotDualPowerConnectable { .. })
        ));
        assert!(matches!(
            bp.add_power_connection_at("sw", 2, "pole", 0),
            Err(BlueprintError::InvalidPowerSide(2))
        ));
    }

    #[test]
    fn non_power_entity_rejected() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        bp.add_entity_with_id(Entity::new(&data, "small-electric-pole").unwrap(), "p")
            .unwrap();
        assert!(matches!(
            bp.add_power_connection("box", "p"),
            Err(BlueprintError::NotPowerConnectable(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Entity removal
    // -----------------------------------------------------------------------

    #[test]
    fn remove_entity_strips_edges_and_renumbers() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(chest(&data), "a").unwrap(); // 0
        bp.add_entity_with_id(chest(&data), "b").unwrap(); // 1
        bp.add_entity_with_id(chest(&data), "c").unwrap(); // 2
        bp.add_circuit_connection(WireColor::Red, "a", "b").unwrap();
        bp.add_circuit_connection(WireColor::Green, "b", "c").unwrap();
        bp.add_circuit_connection(WireColor::Red, "a", "c").unwrap();

        let removed = bp.remove_entity("b").unwrap();
        assert_eq!(removed.name(), "steel-chest");
        assert_eq!(bp.len(), 2);

        // No edge may still mention the removed slot; "c" now lives at 1.
        assert_eq!(
            bp.circuit_connections("a", 1, WireColor::Red).unwrap(),
            &[ConnectionTarget { entity: 1, circuit_id: None }]
        );
        assert!(bp.circuit_connections("c", 1, WireColor::Green).unwrap().is_empty());
        assert_eq!(bp.entity("c").unwrap().name(), "steel-chest");
        assert!(matches!(
            bp.entity("b"),
            Err(BlueprintError::EntityNotFound(_))
        ));
        assert_eq!(bp.id_of(1), Some("c"));
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    #[test]
    fn version_round_trips_through_parts() {
        let mut bp = Blueprint::new();
        assert_eq!(bp.version_parts(), (1, 1, 0, 0));
        bp.set_version(2, 0, 47, 3);
        assert_eq!(bp.version_parts(), (2, 0, 47, 3));
    }

    #[test]
    fn icons_auto_index() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.set_icons(&data, &["signal-A", "iron-ore"]).unwrap();
        assert_eq!(bp.icons()[0].index, 1);
        assert_eq!(bp.icons()[1].index, 2);
        assert!(bp.set_icons(&data, &["bogus"]).is_err());
    }

    // -----------------------------------------------------------------------
    // Serialization structure
    // -----------------------------------------------------------------------

    #[test]
    fn to_value_shapes_connections() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "decider-combinator").unwrap(), "dc")
            .unwrap();
        bp.add_entity_with_id(chest(&data), "box").unwrap();
        bp.add_circuit_connection_at(WireColor::Red, "dc", 2, "box", 1)
            .unwrap();

        let value = bp.to_value().unwrap();
        let entities = value["blueprint"]["entities"].as_array().unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0]["entity_number"], json!(1));
        assert_eq!(
            entities[0]["connections"],
            json!({"2": {"red": [{"entity_id": 2}]}})
        );
        assert_eq!(
            entities[1]["connections"],
            json!({"1": {"red": [{"entity_id": 1, "circuit_id": 2}]}})
        );
        assert_eq!(value["blueprint"]["item"], json!("blueprint"));
    }

    #[test]
    fn to_value_neighbours_for_plain_poles_only() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.add_entity_with_id(Entity::new(&data, "small-electric-pole").unwrap(), "p1")
            .unwrap();
        bp.add_entity_with_id(Entity::new(&data, "small-electric-pole").unwrap(), "p2")
            .unwrap();
        bp.add_entity_with_id(Entity::new(&data, "power-switch").unwrap(), "sw")
            .unwrap();
        bp.add_power_connection("p1", "p2").unwrap();
        bp.add_power_connection_at("sw", 0, "p1", 0).unwrap();

        let value = bp.to_value().unwrap();
        let entities = value["blueprint"]["entities"].as_array().unwrap();
        // Pole-to-pole links appear on both poles; the switch link appears
        // only under the switch's Cu key.
        assert_eq!(entities[0]["neighbours"], json!([2]));
        assert_eq!(entities[1]["neighbours"], json!([1]));
        assert_eq!(
            entities[2]["connections"],
            json!({"Cu0": [{"entity_id": 1, "wire_id": 0}]})
        );
        assert!(entities[0].get("connections").is_none());
    }

    #[test]
    fn from_value_rebuilds_mirrored_graph() {
        let data = data();
        let mut bp = Blueprint::new();
        bp.set_label(Some("test"));
        bp.add_entity_with_id(Entity::new(&data, "decider-combinator").unwrap(), "dc")
            .unwrap();
        bp.add_entity(chest(&data));
        bp.add_circuit_connection_at(WireColor::Green, "dc", 1, 1, 1)
            .unwrap();

        let rebuilt = Blueprint::from_value(&data, &bp.to_value().unwrap()).unwrap();
        assert_eq!(rebuilt, bp);
        assert_eq!(rebuilt.label(), Some("test"));
        assert_eq!(
            rebuilt.circuit_connections(1, 1, WireColor::Green).unwrap(),
            &[ConnectionTarget { entity: 0, circuit_id: Some(1) }]
        );
    }

    #[test]
    fn from_value_preserves_unknown_toplevel_keys() {
        let data = data();
        let value = json!({
            "blueprint": {
                "item": "blueprint",
                "entities": [],
                "version": 281479271677952u64,
                "schedules": [{"locomotives": []}]
            }
        });
        let bp = Blueprint::from_value(&data, &value).unwrap();
        assert_eq!(bp.extras().get("schedules"), Some(&json!([{"locomotives": []}])));
        let out = bp.to_value().unwrap();
        assert_eq!(out["blueprint"]["schedules"], json!([{"locomotives": []}]));
    }

    #[test]
    fn from_value_rejects_malformed_shapes() {
        let data = data();
        assert!(matches!(
            Blueprint::from_value(&data, &json!(42)),
            Err(ImportError::Structure(_))
        ));
        assert!(matches!(
            Blueprint::from_value(&data, &json!({"not-blueprint": {}})),
            Err(ImportError::Structure(_))
        ));
        let bad_ref = json!({
            "blueprint": {
                "entities": [{
                    "entity_number": 1,
                    "name": "steel-chest",
                    "position": [0, 0],
                    "connections": {"1": {"red": [{"entity_id": 99}]}}
                }],
                "version": 0
            }
        });
        assert!(matches!(
            Blueprint::from_value(&data, &bad_ref),
            Err(ImportError::Structure(_))
        ));
    }
}

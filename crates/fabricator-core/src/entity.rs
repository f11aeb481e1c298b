//! The entity model: typed, schema-validated records for placeable objects.
//!
//! An [`Entity`] is constructed against the immutable game-data tables and
//! carries its prototype's capability flags and tile footprint. Recognized
//! fields are validated on every mutation; unknown input keys are retained
//! in an `extras` map and reported as warnings rather than rejected, so
//! data from unknown schema versions survives a round-trip.

use std::collections::BTreeMap;

use fabricator_data::{CapabilityFlags, GameData};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{ArithmeticCondition, ArithmeticOp, Comparator, DeciderCondition, Operand};
use crate::direction::Direction;
use crate::error::EntityError;
use crate::position::Position;
use crate::signal::SignalId;

/// Signal slots available on a constant combinator.
const CONSTANT_SLOT_COUNT: u16 = 20;

// ---------------------------------------------------------------------------
// Control behavior
// ---------------------------------------------------------------------------

/// One signal slot of a constant combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantSignal {
    pub signal: SignalId,
    pub count: i32,
    /// 1-based slot index.
    pub index: u16,
}

/// The `control_behavior` block of an entity. Sub-blocks at `None` or
/// empty are omitted from serialized output; unknown keys are preserved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlBehavior {
    #[serde(default, skip_serializing_if = "decider_is_absent")]
    pub decider_conditions: Option<DeciderCondition>,
    #[serde(default, skip_serializing_if = "arithmetic_is_absent")]
    pub arithmetic_conditions: Option<ArithmeticCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<ConstantSignal>>,
    /// Unrecognized keys, collected on deserialize and re-emitted as-is.
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

fn decider_is_absent(field: &Option<DeciderCondition>) -> bool {
    field.is_none()
}

fn arithmetic_is_absent(field: &Option<ArithmeticCondition>) -> bool {
    field.is_none()
}

impl ControlBehavior {
    /// Whether serialization would produce no meaningful content. A
    /// present-but-empty condition block counts as empty so that clearing
    /// a condition removes the `control_behavior` key entirely.
    pub fn is_empty(&self) -> bool {
        self.decider_conditions
            .as_ref()
            .is_none_or(DeciderCondition::is_empty)
            && self
                .arithmetic_conditions
                .as_ref()
                .is_none_or(ArithmeticCondition::is_empty)
            && self.filters.as_ref().is_none_or(Vec::is_empty)
            && self.extras.is_empty()
    }

    /// Copy with empty sub-blocks dropped, for canonical minimal output.
    fn minimized(&self) -> ControlBehavior {
        ControlBehavior {
            decider_conditions: self
                .decider_conditions
                .clone()
                .filter(|c| !c.is_empty()),
            arithmetic_conditions: self
                .arithmetic_conditions
                .clone()
                .filter(|c| !c.is_empty()),
            filters: self.filters.clone().filter(|f| !f.is_empty()),
            extras: self.extras.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request filters
// ---------------------------------------------------------------------------

/// A logistic request: `(index, item name, count)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestFilter {
    /// 1-based filter slot; auto-assigned in insertion order when omitted.
    pub index: u16,
    pub name: String,
    pub count: u32,
}

/// Input shape for a request filter; the index may be omitted.
#[derive(Debug, Deserialize)]
struct RequestFilterRepr {
    #[serde(default)]
    index: Option<u16>,
    name: String,
    count: u32,
}

fn filter_index_out_of_range() -> EntityError {
    EntityError::Schema {
        field: "request_filters",
        reason: "filter index out of range".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A placeable object: validated name, position, direction, and per-class
/// attributes. Constructed via [`Entity::new`] (programmatic) or
/// [`Entity::from_value`] (decoded exchange data); both run the same
/// validation.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    class: String,
    tile_width: u32,
    tile_height: u32,
    flags: CapabilityFlags,
    position: Position,
    direction: Direction,
    bar: Option<u32>,
    recipe: Option<String>,
    control_behavior: ControlBehavior,
    request_filters: Vec<RequestFilter>,
    tags: BTreeMap<String, Value>,
    /// Unrecognized input keys, preserved verbatim for re-export.
    extras: BTreeMap<String, Value>,
    /// Non-fatal diagnostics accumulated during construction.
    warnings: Vec<String>,
}

// Warnings are diagnostics, not state: two entities that differ only in
// accumulated warnings are the same entity. Control behaviors compare in
// minimized form, so a cleared condition block equals an absent one.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.class == other.class
            && self.position == other.position
            && self.direction == other.direction
            && self.bar == other.bar
            && self.recipe == other.recipe
            && self.control_behavior.minimized() == other.control_behavior.minimized()
            && self.request_filters == other.request_filters
            && self.tags == other.tags
            && self.extras == other.extras
    }
}

impl Entity {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Construct an entity by prototype name, placed at the center of grid
    /// cell (0, 0). Fails if the name is not in the prototype tables.
    pub fn new(data: &GameData, name: &str) -> Result<Entity, EntityError> {
        let proto = data
            .prototype(name)
            .ok_or_else(|| EntityError::UnknownEntityName(name.to_string()))?;
        Ok(Entity {
            name: proto.name.clone(),
            class: proto.class.clone(),
            tile_width: proto.tile_width,
            tile_height: proto.tile_height,
            flags: proto.flags,
            position: Position::centered(0, 0, proto.tile_width, proto.tile_height),
            direction: Direction::North,
            bar: None,
            recipe: None,
            control_behavior: ControlBehavior::default(),
            request_filters: Vec::new(),
            tags: BTreeMap::new(),
            extras: BTreeMap::new(),
            warnings: Vec::new(),
        })
    }

    /// Construct an entity whose name must belong to a specific prototype
    /// class, e.g. `new_of_class(&data, "reactor", "nuclear-reactor")`.
    pub fn new_of_class(data: &GameData, class: &str, name: &str) -> Result<Entity, EntityError> {
        if !data.is_class_member(class, name) {
            return Err(EntityError::UnknownEntityName(name.to_string()));
        }
        Entity::new(data, name)
    }

    /// Construct an entity from a decoded JSON map, running the same
    /// per-field validation as programmatic construction. Unknown keys are
    /// retained in [`extras`](Entity::extras) and reported as warnings.
    pub fn from_value(data: &GameData, value: &Value) -> Result<Entity, EntityError> {
        let map = value.as_object().ok_or_else(|| EntityError::Schema {
            field: "entity",
            reason: "expected a JSON object".to_string(),
        })?;

        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| EntityError::Schema {
                field: "name",
                reason: "missing or non-string entity name".to_string(),
            })?;
        let mut entity = Entity::new(data, name)?;
        // Position is handled after the loop: the pair form snaps to the
        // oriented footprint, so the direction must be known first.
        let mut position_field: Option<&Value> = None;

        for (key, field) in map {
            match key.as_str() {
                "name" => {}
                "position" => position_field = Some(field),
                "direction" => {
                    let direction: Direction =
                        serde_json::from_value(field.clone()).map_err(|e| {
                            EntityError::Schema {
                                field: "direction",
                                reason: e.to_string(),
                            }
                        })?;
                    entity.direction = direction;
                }
                "bar" => {
                    let bar: u32 =
                        serde_json::from_value(field.clone()).map_err(|e| {
                            EntityError::Schema {
                                field: "bar",
                                reason: e.to_string(),
                            }
                        })?;
                    entity.bar = Some(bar);
                }
                "recipe" => {
                    let recipe: String =
                        serde_json::from_value(field.clone()).map_err(|e| {
                            EntityError::Schema {
                                field: "recipe",
                                reason: e.to_string(),
                            }
                        })?;
                    entity.recipe = Some(recipe);
                }
                "control_behavior" => {
                    let behavior: ControlBehavior = serde_json::from_value(field.clone())
                        .map_err(|e| EntityError::Schema {
                            field: "control_behavior",
                            reason: e.to_string(),
                        })?;
                    entity.control_behavior = behavior;
                }
                "request_filters" => {
                    let reprs: Vec<RequestFilterRepr> = serde_json::from_value(field.clone())
                        .map_err(|e| EntityError::Schema {
                            field: "request_filters",
                            reason: e.to_string(),
                        })?;
                    let mut filters = Vec::with_capacity(reprs.len());
                    let mut next_index: Option<u16> = Some(1);
                    for repr in reprs {
                        if !data.is_item(&repr.name) {
                            return Err(EntityError::Schema {
                                field: "request_filters",
                                reason: format!("unknown item '{}'", repr.name),
                            });
                        }
                        let index = match repr.index {
                            Some(index) => index,
                            None => next_index.ok_or_else(filter_index_out_of_range)?,
                        };
                        next_index = index.checked_add(1);
                        filters.push(RequestFilter {
                            index,
                            name: repr.name,
                            count: repr.count,
                        });
                    }
                    entity.request_filters = filters;
                }
                "tags" => {
                    let tags: BTreeMap<String, Value> = serde_json::from_value(field.clone())
                        .map_err(|e| EntityError::Schema {
                            field: "tags",
                            reason: e.to_string(),
                        })?;
                    entity.tags = tags;
                }
                unknown => {
                    tracing::warn!(entity = %entity.name, key = %unknown, "unknown field retained");
                    entity
                        .warnings
                        .push(format!("'{}' has no attribute '{unknown}'", entity.name));
                    entity.extras.insert(unknown.to_string(), field.clone());
                }
            }
        }

        // A `[gx, gy]` pair names a grid cell and snaps to the footprint
        // center; an `{x, y}` map is an absolute position taken as-is.
        match position_field {
            Some(field @ Value::Array(_)) => {
                let (gx, gy): (f64, f64) =
                    serde_json::from_value(field.clone()).map_err(|e| EntityError::Schema {
                        field: "position",
                        reason: e.to_string(),
                    })?;
                entity.set_grid_position(gx.trunc() as i64, gy.trunc() as i64);
            }
            Some(field @ Value::Object(_)) => {
                let position: Position =
                    serde_json::from_value(field.clone()).map_err(|e| EntityError::Schema {
                        field: "position",
                        reason: e.to_string(),
                    })?;
                entity.set_position(position)?;
            }
            Some(_) => {
                return Err(EntityError::Schema {
                    field: "position",
                    reason: "expected a [x, y] pair or {x, y} mapping".to_string(),
                });
            }
            None => {}
        }

        Ok(entity)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn flags(&self) -> CapabilityFlags {
        self.flags
    }

    pub fn power_connectable(&self) -> bool {
        self.flags.power_connectable
    }

    pub fn dual_power_connectable(&self) -> bool {
        self.flags.dual_power_connectable
    }

    pub fn circuit_connectable(&self) -> bool {
        self.flags.circuit_connectable
    }

    pub fn dual_circuit_connectable(&self) -> bool {
        self.flags.dual_circuit_connectable
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn bar(&self) -> Option<u32> {
        self.bar
    }

    pub fn recipe(&self) -> Option<&str> {
        self.recipe.as_deref()
    }

    pub fn control_behavior(&self) -> &ControlBehavior {
        &self.control_behavior
    }

    pub fn request_filters(&self) -> &[RequestFilter] {
        &self.request_filters
    }

    pub fn tags(&self) -> &BTreeMap<String, Value> {
        &self.tags
    }

    /// Unrecognized input keys retained for re-export.
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    /// Non-fatal diagnostics accumulated while constructing this entity.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // -----------------------------------------------------------------------
    // General setters
    // -----------------------------------------------------------------------

    /// Set an absolute position. Rejects non-finite coordinates.
    pub fn set_position(&mut self, position: Position) -> Result<(), EntityError> {
        if !position.is_finite() {
            return Err(EntityError::Schema {
                field: "position",
                reason: "coordinates must be finite".to_string(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Place the entity's top-left tile at grid cell `(gx, gy)`, snapping
    /// the position to the center of its oriented footprint. Set the
    /// direction first; rotating afterwards does not move the entity.
    pub fn set_grid_position(&mut self, gx: i64, gy: i64) {
        let (width, height) = self.footprint();
        self.position = Position::centered(gx, gy, width, height);
    }

    /// Tile footprint with the current orientation applied: East and West
    /// swap the prototype's width and height.
    pub fn footprint(&self) -> (u32, u32) {
        match self.direction {
            Direction::East | Direction::West => (self.tile_height, self.tile_width),
            _ => (self.tile_width, self.tile_height),
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Set the inventory bar limit; `None` clears it.
    pub fn set_bar(&mut self, bar: Option<u32>) {
        self.bar = bar;
    }

    /// Set the crafting recipe name; `None` clears it.
    pub fn set_recipe(&mut self, recipe: Option<&str>) {
        self.recipe = recipe.map(str::to_string);
    }

    /// Set a single tag; a `None` value removes the key.
    pub fn set_tag(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.tags.insert(key.to_string(), v);
            }
            None => {
                self.tags.remove(key);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Request filters
    // -----------------------------------------------------------------------

    /// Replace the request filter list. Indices are assigned 1, 2, 3, ...
    /// in the order given. Item names are validated against the item table.
    pub fn set_request_filters(
        &mut self,
        data: &GameData,
        filters: &[(&str, u32)],
    ) -> Result<(), EntityError> {
        let mut validated = Vec::with_capacity(filters.len());
        for (i, &(name, count)) in filters.iter().enumerate() {
            if !data.is_item(name) {
                return Err(EntityError::Schema {
                    field: "request_filters",
                    reason: format!("unknown item '{name}'"),
                });
            }
            validated.push(RequestFilter {
                index: u16::try_from(i + 1).map_err(|_| filter_index_out_of_range())?,
                name: name.to_string(),
                count,
            });
        }
        self.request_filters = validated;
        Ok(())
    }

    /// Append one request filter at the next free index.
    pub fn add_request_filter(
        &mut self,
        data: &GameData,
        name: &str,
        count: u32,
    ) -> Result<(), EntityError> {
        if !data.is_item(name) {
            return Err(EntityError::Schema {
                field: "request_filters",
                reason: format!("unknown item '{name}'"),
            });
        }
        let index = self
            .request_filters
            .iter()
            .map(|f| f.index)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(filter_index_out_of_range)?;
        self.request_filters.push(RequestFilter {
            index,
            name: name.to_string(),
            count,
        });
        Ok(())
    }

    pub fn clear_request_filters(&mut self) {
        self.request_filters.clear();
    }

    // -----------------------------------------------------------------------
    // Decider combinator control
    // -----------------------------------------------------------------------

    /// Set the decider condition. Passing `None` for every argument clears
    /// the condition to an empty structure (and `to_value` then omits the
    /// `control_behavior` key entirely).
    pub fn set_decider_conditions(
        &mut self,
        first: Option<Operand>,
        comparator: Option<&str>,
        second: Option<Operand>,
        output: Option<SignalId>,
    ) -> Result<(), EntityError> {
        self.require_class("decider-combinator", "decider_conditions")?;
        let comparator = comparator.map(Comparator::parse).transpose()?;

        let cond = self
            .control_behavior
            .decider_conditions
            .get_or_insert_with(DeciderCondition::default);
        cond.set_first(first);
        cond.comparator = comparator;
        cond.set_second(second);
        cond.output_signal = output;
        Ok(())
    }

    /// Set whether the decider copies the input count to its output;
    /// `None` removes the key.
    pub fn set_copy_count_from_input(&mut self, copy: Option<bool>) -> Result<(), EntityError> {
        self.require_class("decider-combinator", "copy_count_from_input")?;
        self.control_behavior
            .decider_conditions
            .get_or_insert_with(DeciderCondition::default)
            .copy_count_from_input = copy;
        Ok(())
    }

    pub fn remove_decider_conditions(&mut self) {
        self.control_behavior.decider_conditions = None;
    }

    // -----------------------------------------------------------------------
    // Arithmetic combinator control
    // -----------------------------------------------------------------------

    /// Set the arithmetic operation. All-`None` clears to empty.
    pub fn set_arithmetic_conditions(
        &mut self,
        first: Option<Operand>,
        operation: Option<&str>,
        second: Option<Operand>,
        output: Option<SignalId>,
    ) -> Result<(), EntityError> {
        self.require_class("arithmetic-combinator", "arithmetic_conditions")?;
        let operation = operation.map(ArithmeticOp::parse).transpose()?;

        let cond = self
            .control_behavior
            .arithmetic_conditions
            .get_or_insert_with(ArithmeticCondition::default);
        cond.set_first(first);
        cond.operation = operation;
        cond.set_second(second);
        cond.output_signal = output;
        Ok(())
    }

    pub fn remove_arithmetic_conditions(&mut self) {
        self.control_behavior.arithmetic_conditions = None;
    }

    // -----------------------------------------------------------------------
    // Constant combinator signals
    // -----------------------------------------------------------------------

    /// Write a signal into slot `slot` (0-based) of a constant combinator.
    pub fn set_signal(
        &mut self,
        data: &GameData,
        slot: u16,
        name: &str,
        count: i32,
    ) -> Result<(), EntityError> {
        self.require_class("constant-combinator", "filters")?;
        if slot >= CONSTANT_SLOT_COUNT {
            return Err(EntityError::Schema {
                field: "filters",
                reason: format!("slot {slot} out of range (0..{CONSTANT_SLOT_COUNT})"),
            });
        }
        let signal = SignalId::resolve(data, name)?;
        let index = slot + 1;

        let filters = self.control_behavior.filters.get_or_insert_with(Vec::new);
        if let Some(existing) = filters.iter_mut().find(|f| f.index == index) {
            existing.signal = signal;
            existing.count = count;
        } else {
            filters.push(ConstantSignal {
                signal,
                count,
                index,
            });
            filters.sort_by_key(|f| f.index);
        }
        Ok(())
    }

    /// Clear all constant combinator signals.
    pub fn clear_signals(&mut self) {
        self.control_behavior.filters = None;
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// The canonical minimal JSON map for this entity: fields at default
    /// values (identity direction, empty control behavior, empty lists)
    /// are omitted entirely; `extras` are re-emitted verbatim.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        Ok(Value::Object(self.to_map()?))
    }

    /// [`to_value`](Entity::to_value) as a bare map, for callers that add
    /// surrounding keys (entity numbering, connections).
    pub(crate) fn to_map(&self) -> Result<serde_json::Map<String, Value>, serde_json::Error> {
        let mut map = serde_json::Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("position".to_string(), serde_json::to_value(self.position)?);
        if self.direction != Direction::North {
            map.insert(
                "direction".to_string(),
                Value::from(u8::from(self.direction)),
            );
        }
        if let Some(bar) = self.bar {
            map.insert("bar".to_string(), Value::from(bar));
        }
        if let Some(ref recipe) = self.recipe {
            map.insert("recipe".to_string(), Value::String(recipe.clone()));
        }
        if !self.control_behavior.is_empty() {
            map.insert(
                "control_behavior".to_string(),
                serde_json::to_value(self.control_behavior.minimized())?,
            );
        }
        if !self.request_filters.is_empty() {
            map.insert(
                "request_filters".to_string(),
                serde_json::to_value(&self.request_filters)?,
            );
        }
        if !self.tags.is_empty() {
            map.insert("tags".to_string(), serde_json::to_value(&self.tags)?);
        }
        for (key, value) in &self.extras {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(map)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn require_class(&self, class: &str, field: &'static str) -> Result<(), EntityError> {
        if self.class != class {
            return Err(EntityError::Schema {
                field,
                reason: format!("only valid for class '{class}', '{}' is '{}'", self.name, self.class),
            });
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

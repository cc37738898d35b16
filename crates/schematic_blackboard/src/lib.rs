// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed blackboard property store for Schematic graphs.
//!
//! The blackboard is the shared state graphs bind against: a flat set of
//! named, typed properties addressed by stable hashed handles. Graphs consume
//! it through the `BlackboardSource` trait from `schematic_graph`; this crate
//! owns the mutable store, its type checking, and its revision counter.
//!
//! Property *values* change freely at runtime. The property *set* (names and
//! declared types) is an edit-time concern: defining or removing a property
//! bumps the revision, which tells bound graphs to regenerate their dynamic
//! ports on the next validation pass.

use indexmap::IndexMap;
use schematic_graph::{BlackboardSource, DataType, ObjectRef, PropertyHandle, Value};
use serde::{Deserialize, Serialize};

/// Error from a blackboard operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlackboardError {
    /// A property with this name already exists
    #[error("property '{0}' is already defined")]
    AlreadyDefined(String),

    /// Two distinct names hashed to the same handle.
    ///
    /// Rejected outright at definition time; a silently shared handle would
    /// make bindings ambiguous forever after.
    #[error("property name '{name}' collides with existing property '{existing}'")]
    HashCollision {
        /// Name being defined
        name: String,
        /// Name already holding the handle
        existing: String,
    },

    /// No property behind the handle
    #[error("no property for handle {0:#x}")]
    UnknownProperty(u64),

    /// Value does not conform to the property's declared type
    #[error("property '{name}' is {expected}, value is not")]
    TypeMismatch {
        /// Property name
        name: String,
        /// Declared type
        expected: DataType,
    },
}

/// Directory entry for one property: its name, declared type, and the slot
/// holding its value in the table for that type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Property {
    name: String,
    data_type: DataType,
    slot: usize,
}

/// Value storage partitioned by static type.
///
/// One table per value shape instead of a heterogeneous map, so reads and
/// writes of value-typed properties touch a plain `Vec` rather than a boxed
/// dynamic value. Slots of removed properties are abandoned (the directory is
/// the source of truth); the property set is small and edit-time only.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    bools: Vec<bool>,
    ints: Vec<i32>,
    floats: Vec<f32>,
    vector2s: Vec<[f32; 2]>,
    vector3s: Vec<[f32; 3]>,
    strings: Vec<String>,
    objects: Vec<ObjectRef>,
    arrays: Vec<Vec<Value>>,
}

impl Tables {
    /// Store a shape-checked value, returning its slot in the type's table
    fn push(&mut self, value: Value) -> usize {
        match value {
            Value::Bool(v) => push_slot(&mut self.bools, v),
            Value::Int(v) => push_slot(&mut self.ints, v),
            Value::Float(v) => push_slot(&mut self.floats, v),
            Value::Vector2(v) => push_slot(&mut self.vector2s, v),
            Value::Vector3(v) => push_slot(&mut self.vector3s, v),
            Value::String(v) => push_slot(&mut self.strings, v),
            Value::Object(v) => push_slot(&mut self.objects, v),
            Value::Array(v) => push_slot(&mut self.arrays, v),
        }
    }

    /// Overwrite the slot a property occupies
    fn write(&mut self, slot: usize, value: Value) {
        match value {
            Value::Bool(v) => self.bools[slot] = v,
            Value::Int(v) => self.ints[slot] = v,
            Value::Float(v) => self.floats[slot] = v,
            Value::Vector2(v) => self.vector2s[slot] = v,
            Value::Vector3(v) => self.vector3s[slot] = v,
            Value::String(v) => self.strings[slot] = v,
            Value::Object(v) => self.objects[slot] = v,
            Value::Array(v) => self.arrays[slot] = v,
        }
    }

    /// Read a slot back as a [`Value`], selecting the table by declared type
    fn read(&self, data_type: &DataType, slot: usize) -> Value {
        match data_type {
            DataType::Bool => Value::Bool(self.bools[slot]),
            DataType::Int => Value::Int(self.ints[slot]),
            DataType::Float => Value::Float(self.floats[slot]),
            DataType::Vector2 => Value::Vector2(self.vector2s[slot]),
            DataType::Vector3 => Value::Vector3(self.vector3s[slot]),
            DataType::String => Value::String(self.strings[slot].clone()),
            DataType::Object(_) => Value::Object(self.objects[slot]),
            DataType::Array(_) => Value::Array(self.arrays[slot].clone()),
        }
    }
}

fn push_slot<T>(table: &mut Vec<T>, value: T) -> usize {
    table.push(value);
    table.len() - 1
}

/// The mutable property store.
///
/// A handle-keyed directory (in definition order) over per-type value tables.
/// Values are type-checked against the declared type on every write; reads
/// hand out owned values, never references into the store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Blackboard {
    properties: IndexMap<PropertyHandle, Property>,
    tables: Tables,
    revision: u64,
}

impl Blackboard {
    /// Create an empty blackboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a property with an initial value, returning its handle.
    ///
    /// Bumps the revision. The initial value must conform to the declared
    /// type; object values only need the right shape here since class
    /// assignability is a link-validation concern, not a storage one.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        value: Value,
    ) -> Result<PropertyHandle, BlackboardError> {
        let name = name.into();
        let handle = PropertyHandle::from_name(&name);
        self.define_at(handle, name, data_type, value)
    }

    // Seam below `define`: lets the collision branch be driven directly,
    // since two short names hashing together cannot be conjured on demand.
    fn define_at(
        &mut self,
        handle: PropertyHandle,
        name: String,
        data_type: DataType,
        value: Value,
    ) -> Result<PropertyHandle, BlackboardError> {
        if let Some(existing) = self.properties.get(&handle) {
            if existing.name == name {
                return Err(BlackboardError::AlreadyDefined(name));
            }
            return Err(BlackboardError::HashCollision {
                name,
                existing: existing.name.clone(),
            });
        }
        check_shape(&name, &data_type, &value)?;

        tracing::debug!(%name, %data_type, "blackboard property defined");
        let slot = self.tables.push(value);
        self.properties.insert(
            handle,
            Property {
                name,
                data_type,
                slot,
            },
        );
        self.revision += 1;
        Ok(handle)
    }

    /// Remove a property, returning its final value. Bumps the revision.
    ///
    /// Graphs bound to the handle degrade gracefully: their ports go hidden
    /// and their links are stripped on the next validation pass.
    pub fn remove(&mut self, handle: PropertyHandle) -> Result<Value, BlackboardError> {
        let property = self
            .properties
            .shift_remove(&handle)
            .ok_or(BlackboardError::UnknownProperty(handle.0))?;
        tracing::debug!(name = %property.name, "blackboard property removed");
        self.revision += 1;
        Ok(self.tables.read(&property.data_type, property.slot))
    }

    /// Set a property's value, type-checked against its declared type.
    ///
    /// Does not bump the revision: value changes never invalidate ports.
    pub fn set(&mut self, handle: PropertyHandle, value: Value) -> Result<(), BlackboardError> {
        let property = self
            .properties
            .get(&handle)
            .ok_or(BlackboardError::UnknownProperty(handle.0))?;
        check_shape(&property.name, &property.data_type, &value)?;
        self.tables.write(property.slot, value);
        Ok(())
    }

    /// Set a property by Rust value
    pub fn set_as<T: BlackboardValue>(
        &mut self,
        handle: PropertyHandle,
        value: T,
    ) -> Result<(), BlackboardError> {
        self.set(handle, value.into_value())
    }

    /// Current value of a property
    pub fn value(&self, handle: PropertyHandle) -> Option<Value> {
        self.properties
            .get(&handle)
            .map(|p| self.tables.read(&p.data_type, p.slot))
    }

    /// Read a property as a concrete Rust type; `None` on type mismatch
    pub fn get<T: BlackboardValue>(&self, handle: PropertyHandle) -> Option<T> {
        T::from_value(self.value(handle)?)
    }

    /// Handle of a property by name, if defined
    pub fn find(&self, name: &str) -> Option<PropertyHandle> {
        let handle = PropertyHandle::from_name(name);
        self.properties
            .get(&handle)
            .filter(|p| p.name == name)
            .map(|_| handle)
    }

    /// All properties in definition order: name, declared type, handle
    pub fn properties(&self) -> impl Iterator<Item = (&str, &DataType, PropertyHandle)> {
        self.properties
            .iter()
            .map(|(handle, p)| (p.name.as_str(), &p.data_type, *handle))
    }

    /// Number of defined properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no properties are defined
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl BlackboardSource for Blackboard {
    fn property_type(&self, handle: PropertyHandle) -> Option<DataType> {
        self.properties.get(&handle).map(|p| p.data_type.clone())
    }

    fn property_value(&self, handle: PropertyHandle) -> Option<Value> {
        self.value(handle)
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// Structural type check, ignoring class hierarchies.
///
/// Storage only guards the value's shape; whether an object's class is
/// assignable where the property is consumed is decided by link validation
/// against the host's class table.
fn check_shape(name: &str, expected: &DataType, value: &Value) -> Result<(), BlackboardError> {
    if value.matches_shape(expected) {
        Ok(())
    } else {
        Err(BlackboardError::TypeMismatch {
            name: name.to_string(),
            expected: expected.clone(),
        })
    }
}

/// Conversion between Rust types and blackboard [`Value`]s.
pub trait BlackboardValue: Sized {
    /// Wrap into a [`Value`]
    fn into_value(self) -> Value;
    /// Unwrap from a [`Value`]; `None` if the variant does not match
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! blackboard_value {
    ($ty:ty, $variant:ident) => {
        impl BlackboardValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

blackboard_value!(bool, Bool);
blackboard_value!(i32, Int);
blackboard_value!(f32, Float);
blackboard_value!([f32; 2], Vector2);
blackboard_value!([f32; 3], Vector3);
blackboard_value!(String, String);
blackboard_value!(ObjectRef, Object);
blackboard_value!(Vec<Value>, Array);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_set_get() {
        let mut bb = Blackboard::new();
        let health = bb.define("health", DataType::Int, Value::Int(100)).unwrap();
        let name = bb
            .define("name", DataType::String, Value::String("hero".into()))
            .unwrap();

        assert_eq!(bb.get::<i32>(health), Some(100));
        bb.set_as(health, 85).unwrap();
        assert_eq!(bb.get::<i32>(health), Some(85));
        assert_eq!(bb.get::<String>(name), Some("hero".to_string()));
        // Wrong type reads as None, never panics
        assert_eq!(bb.get::<f32>(health), None);
        assert_eq!(bb.find("health"), Some(health));
        assert_eq!(bb.find("mana"), None);
    }

    #[test]
    fn test_writes_are_type_checked() {
        let mut bb = Blackboard::new();
        let speed = bb.define("speed", DataType::Float, Value::Float(1.0)).unwrap();
        assert!(matches!(
            bb.set(speed, Value::Int(3)),
            Err(BlackboardError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bb.define("speed2", DataType::Float, Value::Bool(true)),
            Err(BlackboardError::TypeMismatch { .. })
        ));
        // Failed write left the old value
        assert_eq!(bb.get::<f32>(speed), Some(1.0));
    }

    #[test]
    fn test_redefinition_and_unknown_handles() {
        let mut bb = Blackboard::new();
        bb.define("flag", DataType::Bool, Value::Bool(false)).unwrap();
        assert!(matches!(
            bb.define("flag", DataType::Int, Value::Int(0)),
            Err(BlackboardError::AlreadyDefined(_))
        ));

        let stale = PropertyHandle::from_name("gone");
        assert!(matches!(
            bb.set(stale, Value::Bool(true)),
            Err(BlackboardError::UnknownProperty(_))
        ));
        assert!(matches!(
            bb.remove(stale),
            Err(BlackboardError::UnknownProperty(_))
        ));
        assert_eq!(bb.value(stale), None);
    }

    #[test]
    fn test_colliding_names_are_rejected_not_merged() {
        let mut bb = Blackboard::new();
        let handle = bb.define("speed", DataType::Float, Value::Float(1.0)).unwrap();

        // A different name landing on an occupied handle must be refused;
        // accepting it would alias two properties behind one binding.
        let err = bb
            .define_at(handle, "velocity".to_string(), DataType::Float, Value::Float(2.0))
            .unwrap_err();
        assert_eq!(
            err,
            BlackboardError::HashCollision {
                name: "velocity".to_string(),
                existing: "speed".to_string(),
            }
        );
        // The original property is untouched
        assert_eq!(bb.get::<f32>(handle), Some(1.0));
        assert_eq!(bb.len(), 1);
    }

    #[test]
    fn test_revision_tracks_the_property_set_not_values() {
        let mut bb = Blackboard::new();
        let r0 = bb.revision();
        let speed = bb.define("speed", DataType::Float, Value::Float(0.0)).unwrap();
        let r1 = bb.revision();
        assert_ne!(r0, r1);

        // Value writes leave the revision alone
        bb.set(speed, Value::Float(9.0)).unwrap();
        assert_eq!(bb.revision(), r1);

        assert_eq!(bb.remove(speed), Ok(Value::Float(9.0)));
        assert_ne!(bb.revision(), r1);
        assert_eq!(bb.value(speed), None);
    }

    #[test]
    fn test_enumeration_in_definition_order() {
        let mut bb = Blackboard::new();
        for (name, ty, value) in [
            ("a", DataType::Int, Value::Int(1)),
            ("b", DataType::Bool, Value::Bool(true)),
            ("c", DataType::Vector3, Value::Vector3([1.0, 2.0, 3.0])),
        ] {
            bb.define(name, ty, value).unwrap();
        }
        let names: Vec<_> = bb.properties().map(|(name, _, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(bb.len(), 3);
    }

    #[test]
    fn test_source_view_matches_store() {
        let mut bb = Blackboard::new();
        let pos = bb
            .define("position", DataType::Vector2, Value::Vector2([3.0, 4.0]))
            .unwrap();

        let source: &dyn BlackboardSource = &bb;
        assert_eq!(source.property_type(pos), Some(DataType::Vector2));
        assert_eq!(source.property_value(pos), Some(Value::Vector2([3.0, 4.0])));
        assert_eq!(source.revision(), bb.revision);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data types and runtime values carried by data ports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Index of a registered class in a [`ClassRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32);

/// Reference to an engine-side object instance.
///
/// `id == 0` is the null reference; a data read that falls back to the
/// default of an object-typed port yields a null reference rather than
/// failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Class of the referenced object
    pub class: ClassId,
    /// Opaque instance id (0 = null)
    pub id: u64,
}

impl ObjectRef {
    /// Create a null reference of the given class
    pub fn null(class: ClassId) -> Self {
        Self { class, id: 0 }
    }

    /// Whether this reference points at nothing
    pub fn is_null(&self) -> bool {
        self.id == 0
    }
}

/// Declared type of a data port or blackboard property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// String value
    String,
    /// Object reference of a registered class
    Object(ClassId),
    /// Homogeneous array of the element type
    Array(Box<DataType>),
}

impl DataType {
    /// Whether this is a reference type (subclass assignability applies)
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Default value for this type, used when a data read cannot be resolved
    pub fn default_value(&self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Vector2 => Value::Vector2([0.0; 2]),
            Self::Vector3 => Value::Vector3([0.0; 3]),
            Self::String => Value::String(String::new()),
            Self::Object(class) => Value::Object(ObjectRef::null(*class)),
            Self::Array(_) => Value::Array(Vec::new()),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Vector2 => write!(f, "vector2"),
            Self::Vector3 => write!(f, "vector3"),
            Self::String => write!(f, "string"),
            Self::Object(class) => write!(f, "object({})", class.0),
            Self::Array(elem) => write!(f, "array<{elem}>"),
        }
    }
}

/// Runtime value flowing through data ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// String
    String(String),
    /// Object reference
    Object(ObjectRef),
    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Whether this value has the shape the declared type requires.
    ///
    /// Structural only: an object value matches any object-typed declaration
    /// regardless of class, since class assignability belongs to link
    /// validation, not to value storage. Arrays check every element against
    /// the declared element type.
    pub fn matches_shape(&self, ty: &DataType) -> bool {
        match (self, ty) {
            (Self::Bool(_), DataType::Bool)
            | (Self::Int(_), DataType::Int)
            | (Self::Float(_), DataType::Float)
            | (Self::Vector2(_), DataType::Vector2)
            | (Self::Vector3(_), DataType::Vector3)
            | (Self::String(_), DataType::String)
            | (Self::Object(_), DataType::Object(_)) => true,
            (Self::Array(items), DataType::Array(elem)) => {
                items.iter().all(|v| v.matches_shape(elem))
            }
            _ => false,
        }
    }
}

/// Closed table of object classes with single inheritance.
///
/// Registered once at host start; link validation consults it for
/// `accepts_subclass` assignability instead of any runtime type
/// introspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassRegistry {
    /// Class name -> parent class, in registration order
    classes: IndexMap<String, Option<ClassId>>,
}

impl ClassRegistry {
    /// Create an empty class table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, optionally deriving from a previously registered parent.
    ///
    /// Re-registering a name returns the existing id unchanged.
    pub fn register(&mut self, name: impl Into<String>, parent: Option<ClassId>) -> ClassId {
        let name = name.into();
        if let Some(index) = self.classes.get_index_of(&name) {
            return ClassId(index as u32);
        }
        let (index, _) = self.classes.insert_full(name, parent);
        ClassId(index as u32)
    }

    /// Look up a class id by name
    pub fn get(&self, name: &str) -> Option<ClassId> {
        self.classes.get_index_of(name).map(|i| ClassId(i as u32))
    }

    /// Name of a registered class
    pub fn name(&self, class: ClassId) -> Option<&str> {
        self.classes
            .get_index(class.0 as usize)
            .map(|(name, _)| name.as_str())
    }

    /// Whether a value of class `from` can be assigned where `to` is expected.
    ///
    /// True when `from` equals `to` or derives from it transitively.
    pub fn is_assignable(&self, from: ClassId, to: ClassId) -> bool {
        let mut current = Some(from);
        while let Some(class) = current {
            if class == to {
                return true;
            }
            current = self
                .classes
                .get_index(class.0 as usize)
                .and_then(|(_, parent)| *parent);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_assignability() {
        let mut classes = ClassRegistry::new();
        let actor = classes.register("Actor", None);
        let pawn = classes.register("Pawn", Some(actor));
        let character = classes.register("Character", Some(pawn));
        let widget = classes.register("Widget", None);

        assert!(classes.is_assignable(character, actor));
        assert!(classes.is_assignable(pawn, pawn));
        assert!(!classes.is_assignable(actor, character));
        assert!(!classes.is_assignable(widget, actor));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(DataType::Int.default_value(), Value::Int(0));
        let obj = DataType::Object(ClassId(3)).default_value();
        match obj {
            Value::Object(r) => assert!(r.is_null()),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_value_shape_matching() {
        assert!(Value::Int(1).matches_shape(&DataType::Int));
        assert!(!Value::Int(1).matches_shape(&DataType::Float));

        // Shape is class-blind: any object fits any object declaration
        let v = Value::Object(ObjectRef {
            class: ClassId(7),
            id: 3,
        });
        assert!(v.matches_shape(&DataType::Object(ClassId(0))));

        let ints = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert!(ints.matches_shape(&DataType::Array(Box::new(DataType::Int))));
        assert!(!ints.matches_shape(&DataType::Array(Box::new(DataType::Bool))));
        // An empty array has every element shape
        assert!(Value::Array(Vec::new()).matches_shape(&DataType::Array(Box::new(DataType::Bool))));
    }
}

//! Static result types and method signatures.
//!
//! Every expression node declares a [`DataType`]. Method-call registries are
//! keyed by [`MethodSignature`], the stable identity of a host-library method
//! (declaring type, name and parameter types).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared result type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Char,
    DateTime,
    Guid,
    Object,
    /// Nullable wrapper around a value type
    Nullable(Box<DataType>),
    /// A mapped entity, identified by its type name
    Entity(String),
    /// A record (anonymous type) produced by a `New` expression
    Record(String),
    /// A sequence of items
    Sequence(Box<DataType>),
    /// A group produced by `GroupBy`
    Grouping {
        key: Box<DataType>,
        element: Box<DataType>,
    },
}

impl DataType {
    pub fn entity(name: impl Into<String>) -> Self {
        DataType::Entity(name.into())
    }

    pub fn sequence(item: DataType) -> Self {
        DataType::Sequence(Box::new(item))
    }

    pub fn nullable(inner: DataType) -> Self {
        match inner {
            DataType::Nullable(_) => inner,
            other => DataType::Nullable(Box::new(other)),
        }
    }

    pub fn grouping(key: DataType, element: DataType) -> Self {
        DataType::Grouping {
            key: Box::new(key),
            element: Box::new(element),
        }
    }

    /// Strip a `Nullable` wrapper, if any.
    pub fn underlying(&self) -> &DataType {
        match self {
            DataType::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_))
    }

    /// `Boolean` or `Nullable<Boolean>`.
    pub fn is_boolean(&self) -> bool {
        matches!(self.underlying(), DataType::Boolean)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.underlying(),
            DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::Single
                | DataType::Double
                | DataType::Decimal
        )
    }

    pub fn entity_name(&self) -> Option<&str> {
        match self {
            DataType::Entity(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.entity_name().is_some()
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, DataType::Sequence(_))
    }

    pub fn is_grouping(&self) -> bool {
        matches!(self, DataType::Grouping { .. })
    }

    /// Item type of a sequence or group; `None` for scalar types.
    pub fn item_type(&self) -> Option<&DataType> {
        match self {
            DataType::Sequence(item) => Some(item),
            DataType::Grouping { element, .. } => Some(element),
            _ => None,
        }
    }

    /// The same type with booleans replaced by the integer type used to carry
    /// them as SQL values (nullability preserved).
    pub fn as_sql_value_type(&self) -> DataType {
        match self {
            DataType::Boolean => DataType::Int32,
            DataType::Nullable(inner) if inner.is_boolean() => DataType::nullable(DataType::Int32),
            other => other.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "Boolean"),
            DataType::Int16 => write!(f, "Int16"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::Single => write!(f, "Single"),
            DataType::Double => write!(f, "Double"),
            DataType::Decimal => write!(f, "Decimal"),
            DataType::String => write!(f, "String"),
            DataType::Char => write!(f, "Char"),
            DataType::DateTime => write!(f, "DateTime"),
            DataType::Guid => write!(f, "Guid"),
            DataType::Object => write!(f, "Object"),
            DataType::Nullable(inner) => write!(f, "Nullable<{}>", inner),
            DataType::Entity(name) | DataType::Record(name) => write!(f, "{}", name),
            DataType::Sequence(item) => write!(f, "IEnumerable<{}>", item),
            DataType::Grouping { key, element } => write!(f, "IGrouping<{}, {}>", key, element),
        }
    }
}

/// Stable identity of a host-library method or property getter.
///
/// Properties are keyed with an empty parameter list and `is_property` set,
/// so `String.Length` and a hypothetical `String.Length()` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub declaring_type: String,
    pub name: String,
    pub parameter_types: Vec<DataType>,
    pub is_property: bool,
}

impl MethodSignature {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = DataType>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().collect(),
            is_property: false,
        }
    }

    pub fn property(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: Vec::new(),
            is_property: true,
        }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_property {
            return write!(f, "{}.{}", self.declaring_type, self.name);
        }
        let params = self
            .parameter_types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}.{}({})", self.declaring_type, self.name, params)
    }
}

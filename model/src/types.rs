//! Primitive data types and conceptual value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{ClassEntity, ParseError, ResolutionContext};

/// Primitive data types supported by container properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `boolean`
    #[serde(rename = "boolean")]
    Boolean,
    /// `int32`
    #[serde(rename = "int32")]
    Integer,
    /// `int64`
    #[serde(rename = "int64")]
    Long,
    /// `float32`
    #[serde(rename = "float32")]
    Float,
    /// `float64`
    #[serde(rename = "float64")]
    Double,
    /// `text`
    #[serde(rename = "text")]
    String,
    /// `date`
    #[serde(rename = "date")]
    Date,
    /// `timestamp`
    #[serde(rename = "timestamp")]
    DateTime,
    /// `json`: an opaque document.
    #[serde(rename = "json")]
    Json,
}

impl DataType {
    /// Looks up a data type by name or common alias (case-insensitive).
    pub fn lookup(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => DataType::Boolean,
            "int32" | "int" | "integer" => DataType::Integer,
            "int64" | "long" => DataType::Long,
            "float32" | "float" => DataType::Float,
            "float64" | "double" | "decimal" => DataType::Double,
            "text" | "string" => DataType::String,
            "date" => DataType::Date,
            "timestamp" | "datetime" => DataType::DateTime,
            "json" | "object" => DataType::Json,
            _ => return None,
        })
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "int32",
            DataType::Long => "int64",
            DataType::Float => "float32",
            DataType::Double => "float64",
            DataType::String => "text",
            DataType::Date => "date",
            DataType::DateTime => "timestamp",
            DataType::Json => "json",
        }
    }

    /// Position in the widening chain Boolean ⊂ Integer ⊂ Long ⊂ Float ⊂ Double.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            DataType::Boolean => Some(0),
            DataType::Integer => Some(1),
            DataType::Long => Some(2),
            DataType::Float => Some(3),
            DataType::Double => Some(4),
            _ => None,
        }
    }

    /// `date` or `timestamp`.
    pub fn is_temporal(self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    /// Whether a JSON value is an acceptable default for this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            DataType::Boolean => value.is_boolean(),
            DataType::Integer | DataType::Long => value.is_i64() || value.is_u64(),
            DataType::Float | DataType::Double => value.is_number(),
            DataType::String | DataType::Date | DataType::DateTime => value.is_string(),
            DataType::Json => true,
        }
    }

    /// Coerces a raw default (usually read as text) into a typed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidField`] when the text cannot represent the type.
    pub fn coerce_default(self, raw: &str) -> Result<Value, ParseError> {
        let invalid = || ParseError::InvalidField {
            field: "default",
            value: raw.to_string(),
            reason: format!("not a valid {}", self.as_str()),
        };
        let raw = raw.trim();
        match self {
            DataType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            DataType::Integer | DataType::Long => {
                raw.parse::<i64>().map(Value::from).map_err(|_| invalid())
            }
            DataType::Float | DataType::Double => {
                raw.parse::<f64>().map(Value::from).map_err(|_| invalid())
            }
            DataType::String | DataType::Date | DataType::DateTime => {
                Ok(Value::String(raw.to_string()))
            }
            DataType::Json => serde_json::from_str(raw).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ParseError::UnknownDataType(s.to_string()))
    }
}

/// The value type of a conceptual property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    /// A primitive data type.
    Primitive(DataType),
    /// A reference to another class.
    Class(ClassEntity),
    /// A union of several types.
    Union(Vec<ValueType>),
    /// The type could not be resolved.
    Unknown,
}

impl ValueType {
    /// Parses a value-type expression.
    ///
    /// `"text"` is a primitive, `"power:GeoPoint"` or `"GeoPoint"` a class
    /// reference, `"text, int32"` a union and `"unknown"` the sentinel. Bare
    /// names that match a data type are primitives.
    ///
    /// # Errors
    ///
    /// Returns an error for empty expressions or unparseable members.
    pub fn parse(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        let members: Vec<&str> = raw.split(',').map(str::trim).collect();
        if members.iter().any(|m| m.is_empty()) {
            return Err(ParseError::InvalidValueType(raw.to_string()));
        }
        if members.len() == 1 {
            return Self::parse_single(members[0], ctx);
        }
        members
            .into_iter()
            .map(|m| Self::parse_single(m, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(ValueType::Union)
    }

    fn parse_single(raw: &str, ctx: &ResolutionContext) -> Result<Self, ParseError> {
        if raw.eq_ignore_ascii_case("unknown") {
            return Ok(ValueType::Unknown);
        }
        if !raw.contains(':') {
            if let Some(data_type) = DataType::lookup(raw) {
                return Ok(ValueType::Primitive(data_type));
            }
        }
        ClassEntity::parse(raw, ctx).map(ValueType::Class)
    }

    /// Leaf members with nested unions flattened.
    pub fn members(&self) -> Vec<&ValueType> {
        match self {
            ValueType::Union(inner) => inner.iter().flat_map(|v| v.members()).collect(),
            other => vec![other],
        }
    }

    /// Every class this value type refers to.
    pub fn class_references(&self) -> Vec<&ClassEntity> {
        self.members()
            .into_iter()
            .filter_map(|m| match m {
                ValueType::Class(class) => Some(class),
                _ => None,
            })
            .collect()
    }

    /// True if the type is a single class reference.
    pub fn is_class_reference(&self) -> bool {
        matches!(self, ValueType::Class(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Primitive(data_type) => write!(f, "{data_type}"),
            ValueType::Class(class) => write!(f, "{class}"),
            ValueType::Union(members) => {
                let rendered: Vec<String> = members.iter().map(ToString::to_string).collect();
                f.write_str(&rendered.join(", "))
            }
            ValueType::Unknown => f.write_str("unknown"),
        }
    }
}

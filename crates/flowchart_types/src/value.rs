//! Typed variable values
//!
//! A flowchart variable holds exactly one of four primitive types. This module
//! defines the runtime tag for that type, the tagged value itself, and the
//! `VariableKind` trait tying each Rust type to its tag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Variable Type
// ─────────────────────────────────────────────────────────────────────────────

/// The primitive type a variable holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Boolean,
    Integer,
    Float,
    String,
}

impl VariableType {
    /// All supported variable types, in menu order
    pub const ALL: [VariableType; 4] = [
        VariableType::Boolean,
        VariableType::Integer,
        VariableType::Float,
        VariableType::String,
    ];

    /// Name as shown to users and written to manifests
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Boolean => "Boolean",
            VariableType::Integer => "Integer",
            VariableType::Float => "Float",
            VariableType::String => "String",
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variable Value
// ─────────────────────────────────────────────────────────────────────────────

/// A value of one of the supported variable types
///
/// Serialized adjacently tagged: `{ "type": "Integer", "value": 5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum VariableValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl VariableValue {
    /// The default value for a variable type (`false`, `0`, `0.0`, `""`)
    pub fn default_for(ty: VariableType) -> Self {
        match ty {
            VariableType::Boolean => VariableValue::Boolean(false),
            VariableType::Integer => VariableValue::Integer(0),
            VariableType::Float => VariableValue::Float(0.0),
            VariableType::String => VariableValue::String(String::new()),
        }
    }

    /// The type tag of this value
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Boolean(_) => VariableType::Boolean,
            VariableValue::Integer(_) => VariableType::Integer,
            VariableValue::Float(_) => VariableType::Float,
            VariableValue::String(_) => VariableType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariableValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            VariableValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableValue::Boolean(b) => write!(f, "{}", b),
            VariableValue::Integer(i) => write!(f, "{}", i),
            VariableValue::Float(v) => write!(f, "{}", v),
            VariableValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for VariableValue {
    fn from(v: bool) -> Self {
        VariableValue::Boolean(v)
    }
}

impl From<i32> for VariableValue {
    fn from(v: i32) -> Self {
        VariableValue::Integer(v as i64)
    }
}

impl From<i64> for VariableValue {
    fn from(v: i64) -> Self {
        VariableValue::Integer(v)
    }
}

impl From<f32> for VariableValue {
    fn from(v: f32) -> Self {
        VariableValue::Float(v as f64)
    }
}

impl From<f64> for VariableValue {
    fn from(v: f64) -> Self {
        VariableValue::Float(v)
    }
}

impl From<String> for VariableValue {
    fn from(v: String) -> Self {
        VariableValue::String(v)
    }
}

impl From<&str> for VariableValue {
    fn from(v: &str) -> Self {
        VariableValue::String(v.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error when a value does not fit the variable it is applied to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch {
        expected: VariableType,
        actual: VariableType,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Variable Kind
// ─────────────────────────────────────────────────────────────────────────────

/// A Rust type that can live inside a flowchart variable
///
/// Implemented for `bool`, `i64`, `f64` and `String`. Registries and slots are
/// generic over this trait so each supported type gets its own typed entry
/// point without reflection.
pub trait VariableKind:
    Clone + Default + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The variable type this Rust type maps to
    const TYPE: VariableType;

    /// Extract from a value of the matching type
    fn from_value(value: &VariableValue) -> Option<Self>;

    /// Wrap into a tagged value
    fn into_value(self) -> VariableValue;
}

impl VariableKind for bool {
    const TYPE: VariableType = VariableType::Boolean;

    fn from_value(value: &VariableValue) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> VariableValue {
        VariableValue::Boolean(self)
    }
}

impl VariableKind for i64 {
    const TYPE: VariableType = VariableType::Integer;

    fn from_value(value: &VariableValue) -> Option<Self> {
        value.as_i64()
    }

    fn into_value(self) -> VariableValue {
        VariableValue::Integer(self)
    }
}

impl VariableKind for f64 {
    const TYPE: VariableType = VariableType::Float;

    fn from_value(value: &VariableValue) -> Option<Self> {
        value.as_f64()
    }

    fn into_value(self) -> VariableValue {
        VariableValue::Float(self)
    }
}

impl VariableKind for String {
    const TYPE: VariableType = VariableType::String;

    fn from_value(value: &VariableValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn into_value(self) -> VariableValue {
        VariableValue::String(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_type() {
        assert_eq!(VariableValue::default_for(VariableType::Boolean), VariableValue::Boolean(false));
        assert_eq!(VariableValue::default_for(VariableType::Integer), VariableValue::Integer(0));
        assert_eq!(VariableValue::default_for(VariableType::Float), VariableValue::Float(0.0));
        assert_eq!(
            VariableValue::default_for(VariableType::String),
            VariableValue::String(String::new())
        );
    }

    #[test]
    fn test_kind_conversions() {
        assert_eq!(i64::from_value(&VariableValue::Integer(7)), Some(7));
        assert_eq!(i64::from_value(&VariableValue::Float(7.0)), None);
        assert_eq!(String::from_value(&"hi".into()), Some("hi".to_string()));
        assert_eq!(true.into_value(), VariableValue::Boolean(true));
        assert_eq!(<f64 as VariableKind>::TYPE, VariableType::Float);
    }

    #[test]
    fn test_tagged_layout() {
        let json = serde_json::to_value(VariableValue::Integer(5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Integer", "value": 5}));

        let back: VariableValue =
            serde_json::from_value(serde_json::json!({"type": "String", "value": "abc"})).unwrap();
        assert_eq!(back, VariableValue::String("abc".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(VariableValue::Boolean(true).to_string(), "true");
        assert_eq!(VariableValue::Float(2.5).to_string(), "2.5");
        assert_eq!(VariableValue::String("x y".into()).to_string(), "x y");
    }
}

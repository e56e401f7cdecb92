//! Variables
//!
//! A variable is a named, typed, mutable cell scoped to a flowchart. Its type
//! is fixed when it is created; only values of that type can be stored.

use serde::{Deserialize, Serialize};

use crate::{ValueError, VariableType, VariableValue};

// ─────────────────────────────────────────────────────────────────────────────
// Variable
// ─────────────────────────────────────────────────────────────────────────────

/// A named, typed variable
///
/// Persisted as `{ "key": "Score", "type": "Integer", "value": 5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariableRecord", into = "VariableRecord")]
pub struct Variable {
    key: String,
    value: VariableValue,
}

impl Variable {
    /// Create a variable holding the given value
    pub fn new(key: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a variable of the given type holding that type's default
    pub fn with_default(key: impl Into<String>, ty: VariableType) -> Self {
        Self::new(key, VariableValue::default_for(ty))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn variable_type(&self) -> VariableType {
        self.value.variable_type()
    }

    pub fn value(&self) -> &VariableValue {
        &self.value
    }

    /// Replace the value, keeping the variable's type
    pub fn set(&mut self, value: VariableValue) -> Result<(), ValueError> {
        let expected = self.variable_type();
        let actual = value.variable_type();
        if expected != actual {
            return Err(ValueError::TypeMismatch { expected, actual });
        }
        self.value = value;
        Ok(())
    }

    /// Compare this variable's value against a constant
    ///
    /// Integers and floats support every operator. Booleans and strings only
    /// distinguish `Equals`; any other operator is treated as `NotEquals`.
    pub fn evaluate(&self, op: CompareOperator, rhs: &VariableValue) -> Result<bool, ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            expected: self.variable_type(),
            actual: rhs.variable_type(),
        };

        let result = match (&self.value, rhs) {
            (VariableValue::Integer(l), VariableValue::Integer(r)) => op.compare(l, r),
            (VariableValue::Float(l), VariableValue::Float(r)) => op.compare(l, r),
            (VariableValue::Boolean(l), VariableValue::Boolean(r)) => op.equality(l, r),
            (VariableValue::String(l), VariableValue::String(r)) => op.equality(l, r),
            _ => return Err(mismatch()),
        };
        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Form
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk shape of a variable; the value is checked against the type on load
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableRecord {
    key: String,
    #[serde(rename = "type")]
    variable_type: VariableType,
    value: serde_json::Value,
}

impl TryFrom<VariableRecord> for Variable {
    type Error = String;

    fn try_from(record: VariableRecord) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;

        let value = match (record.variable_type, record.value) {
            (VariableType::Boolean, Json::Bool(b)) => VariableValue::Boolean(b),
            (VariableType::Integer, Json::Number(n)) if n.is_i64() => {
                VariableValue::Integer(n.as_i64().unwrap_or_default())
            }
            (VariableType::Float, Json::Number(n)) => {
                VariableValue::Float(n.as_f64().unwrap_or_default())
            }
            (VariableType::Float, Json::String(s)) => match parse_non_finite(&s) {
                Some(f) => VariableValue::Float(f),
                None => {
                    return Err(format!(
                        "variable '{}' of type Float cannot hold \"{}\"",
                        record.key, s
                    ));
                }
            },
            (VariableType::String, Json::String(s)) => VariableValue::String(s),
            (VariableType::String, Json::Null) => VariableValue::String(String::new()),
            (ty, other) => {
                return Err(format!(
                    "variable '{}' of type {} cannot hold {}",
                    record.key, ty, other
                ));
            }
        };

        Ok(Variable {
            key: record.key,
            value,
        })
    }
}

impl From<Variable> for VariableRecord {
    fn from(variable: Variable) -> Self {
        let variable_type = variable.variable_type();
        let value = match variable.value {
            VariableValue::Boolean(b) => serde_json::Value::Bool(b),
            VariableValue::Integer(i) => serde_json::Value::from(i),
            VariableValue::Float(f) => match serde_json::Number::from_f64(f) {
                Some(n) => serde_json::Value::Number(n),
                None => serde_json::Value::String(format_non_finite(f).to_string()),
            },
            VariableValue::String(s) => serde_json::Value::String(s),
        };
        VariableRecord {
            key: variable.key,
            variable_type,
            value,
        }
    }
}

/// Neither JSON nor TOML has a portable NaN or infinity, so those are stored as strings
fn format_non_finite(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn parse_non_finite(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compare Operator
// ─────────────────────────────────────────────────────────────────────────────

/// Comparison used when a command tests a variable against a constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEquals,
    GreaterThanOrEquals,
}

impl CompareOperator {
    fn compare<T: PartialOrd>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOperator::Equals => lhs == rhs,
            CompareOperator::NotEquals => lhs != rhs,
            CompareOperator::LessThan => lhs < rhs,
            CompareOperator::GreaterThan => lhs > rhs,
            CompareOperator::LessThanOrEquals => lhs <= rhs,
            CompareOperator::GreaterThanOrEquals => lhs >= rhs,
        }
    }

    fn equality<T: PartialEq>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            CompareOperator::Equals => lhs == rhs,
            _ => lhs != rhs,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_type() {
        let mut var = Variable::new("Score", 5i64);
        assert!(var.set(VariableValue::Integer(9)).is_ok());
        assert_eq!(var.value(), &VariableValue::Integer(9));

        let err = var.set(VariableValue::from("nine")).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: VariableType::Integer,
                actual: VariableType::String,
            }
        );
        assert_eq!(var.value(), &VariableValue::Integer(9));
    }

    #[test]
    fn test_persisted_layout() {
        let var = Variable::new("Name", "Alice");
        let json = serde_json::to_value(&var).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "Name", "type": "String", "value": "Alice"})
        );

        let back: Variable = serde_json::from_value(json).unwrap();
        assert_eq!(back, var);
    }

    #[test]
    fn test_float_accepts_integer_literal() {
        let var: Variable =
            serde_json::from_value(serde_json::json!({"key": "Speed", "type": "Float", "value": 3}))
                .unwrap();
        assert_eq!(var.value(), &VariableValue::Float(3.0));
    }

    #[test]
    fn test_rejects_mismatched_value() {
        let result: Result<Variable, _> = serde_json::from_value(
            serde_json::json!({"key": "Flag", "type": "Boolean", "value": "yes"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_floats_reload() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let var = Variable::new("Speed", f);
            let json = serde_json::to_string(&var).unwrap();
            let back: Variable = serde_json::from_str(&json).unwrap();
            let reloaded = back.value().as_f64().unwrap();
            assert_eq!(reloaded.is_nan(), f.is_nan());
            if !f.is_nan() {
                assert_eq!(reloaded, f);
            }
        }

        let json = serde_json::to_value(Variable::new("Speed", f64::NAN)).unwrap();
        assert_eq!(json["value"], "NaN");
    }

    #[test]
    fn test_float_rejects_other_strings() {
        let result: Result<Variable, _> = serde_json::from_value(
            serde_json::json!({"key": "Speed", "type": "Float", "value": "fast"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_null_string_loads_empty() {
        let var: Variable =
            serde_json::from_value(serde_json::json!({"key": "S", "type": "String", "value": null}))
                .unwrap();
        assert_eq!(var.value().as_str(), Some(""));
    }

    #[test]
    fn test_numeric_comparisons() {
        let var = Variable::new("Score", 5i64);
        assert!(var.evaluate(CompareOperator::GreaterThan, &4i64.into()).unwrap());
        assert!(var.evaluate(CompareOperator::LessThanOrEquals, &5i64.into()).unwrap());
        assert!(!var.evaluate(CompareOperator::LessThan, &5i64.into()).unwrap());

        let speed = Variable::new("Speed", 1.5f64);
        assert!(speed.evaluate(CompareOperator::GreaterThanOrEquals, &1.5f64.into()).unwrap());
    }

    #[test]
    fn test_string_comparisons_fall_back_to_not_equals() {
        let var = Variable::new("Name", "abc");
        assert!(var.evaluate(CompareOperator::Equals, &"abc".into()).unwrap());
        assert!(!var.evaluate(CompareOperator::NotEquals, &"abc".into()).unwrap());
        assert!(!var.evaluate(CompareOperator::LessThan, &"abc".into()).unwrap());
        assert!(var.evaluate(CompareOperator::GreaterThan, &"abd".into()).unwrap());
    }

    #[test]
    fn test_comparison_type_mismatch() {
        let var = Variable::new("Flag", true);
        assert!(var.evaluate(CompareOperator::Equals, &1i64.into()).is_err());
    }
}

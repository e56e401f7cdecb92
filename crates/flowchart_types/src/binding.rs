//! Invoke modes and listener bindings
//!
//! An invoke command calls a list of bound methods. Which list it uses, and
//! which parameter type those methods take, is selected by its `InvokeMode`.

use serde::{Deserialize, Serialize};

use crate::VariableType;

// ─────────────────────────────────────────────────────────────────────────────
// Invoke Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Which parameter an invoke command passes to its listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvokeMode {
    /// No parameter
    #[default]
    Static,
    Boolean,
    Integer,
    Float,
    String,
}

impl InvokeMode {
    /// Parameter type carried in this mode, `None` for `Static`
    pub fn parameter_type(&self) -> Option<VariableType> {
        match self {
            InvokeMode::Static => None,
            InvokeMode::Boolean => Some(VariableType::Boolean),
            InvokeMode::Integer => Some(VariableType::Integer),
            InvokeMode::Float => Some(VariableType::Float),
            InvokeMode::String => Some(VariableType::String),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InvokeMode::Static => "Static",
            InvokeMode::Boolean => "Boolean",
            InvokeMode::Integer => "Integer",
            InvokeMode::Float => "Float",
            InvokeMode::String => "String",
        }
    }
}

impl From<VariableType> for InvokeMode {
    fn from(ty: VariableType) -> Self {
        match ty {
            VariableType::Boolean => InvokeMode::Boolean,
            VariableType::Integer => InvokeMode::Integer,
            VariableType::Float => InvokeMode::Float,
            VariableType::String => InvokeMode::String,
        }
    }
}

impl std::fmt::Display for InvokeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener Binding
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted reference to a method on a target object
///
/// Bindings are plain data; the runtime resolves them to callables when a
/// command dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerBinding {
    /// Object the method lives on (e.g., "Hud", "Door")
    pub target: String,
    /// Method name (e.g., "SetScore", "Open")
    pub method: String,
}

impl ListenerBinding {
    pub fn new(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for ListenerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.target, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parameter_types() {
        assert_eq!(InvokeMode::Static.parameter_type(), None);
        assert_eq!(InvokeMode::Float.parameter_type(), Some(VariableType::Float));
        for ty in VariableType::ALL {
            assert_eq!(InvokeMode::from(ty).parameter_type(), Some(ty));
        }
    }

    #[test]
    fn test_mode_serializes_by_name() {
        let json = serde_json::to_value(InvokeMode::Integer).unwrap();
        assert_eq!(json, serde_json::json!("Integer"));
    }

    #[test]
    fn test_binding_display() {
        assert_eq!(ListenerBinding::new("Hud", "SetScore").to_string(), "Hud.SetScore");
    }
}

// Variable Slot - A command parameter that is a constant or a variable
//
// A bound reference always wins over the literal. The literal is kept while
// bound so unbinding restores it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use flowchart_types::VariableKind;

use crate::registry::{VariableRef, VariableRegistry};

/// A literal value of `T`, or a reference to a variable of type `T`
#[derive(Debug, Clone, Default)]
pub struct VariableSlot<T: VariableKind> {
    literal: T,
    reference: Option<VariableRef<T>>,
}

impl<T: VariableKind> VariableSlot<T> {
    /// Unbound slot holding a constant
    pub fn literal(value: T) -> Self {
        Self {
            literal: value,
            reference: None,
        }
    }

    /// Slot bound to a variable, with a default literal underneath
    pub fn bound(reference: VariableRef<T>) -> Self {
        Self {
            literal: T::default(),
            reference: Some(reference),
        }
    }

    /// Bind to a variable; the literal is left untouched
    pub fn bind(&mut self, reference: VariableRef<T>) {
        self.reference = Some(reference);
    }

    /// Drop the variable reference, falling back to the literal
    pub fn unbind(&mut self) {
        self.reference = None;
    }

    /// Re-resolve the reference key against a registry
    ///
    /// Used after loading, when only the key is known. Returns `false` and
    /// leaves the slot stale if no variable of type `T` has that key.
    pub fn link(&mut self, registry: &VariableRegistry) -> bool {
        let Some(reference) = &self.reference else {
            return true;
        };
        let key = reference.key();
        match registry.find::<T>(&key) {
            Some(live) => {
                self.reference = Some(live);
                true
            }
            None => {
                warn!("Slot references unknown {} variable {}", T::TYPE, key);
                false
            }
        }
    }

    /// The effective value
    ///
    /// A stale reference yields `T::default()` rather than the literal.
    pub fn resolve(&self) -> T {
        match &self.reference {
            None => self.literal.clone(),
            Some(reference) => reference.get().unwrap_or_else(|| {
                debug!("Variable {} is gone, using default", reference.key());
                T::default()
            }),
        }
    }

    /// Write to the referenced variable if bound, otherwise to the literal
    pub fn assign(&mut self, value: T) {
        match &self.reference {
            None => self.literal = value,
            Some(reference) => {
                if !reference.set(value) {
                    warn!("Dropped write to missing variable {}", reference.key());
                }
            }
        }
    }

    /// Display text: the literal if unbound, else the variable key
    pub fn describe(&self) -> String {
        match &self.reference {
            None => self.literal.clone().into_value().to_string(),
            Some(reference) => reference.key(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.reference.is_some()
    }

    /// Key of the bound variable, live or stale
    pub fn reference_key(&self) -> Option<String> {
        self.reference.as_ref().map(VariableRef::key)
    }

    /// The stored literal, regardless of binding
    pub fn literal_value(&self) -> &T {
        &self.literal
    }
}

impl<T: VariableKind> From<T> for VariableSlot<T> {
    fn from(value: T) -> Self {
        Self::literal(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Form
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: VariableKind"))]
struct SlotRecord<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    literal: T,
    #[serde(default)]
    reference_key: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: VariableKind,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T: VariableKind> Serialize for VariableSlot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SlotRecord {
            literal: self.literal.clone(),
            reference_key: self.reference_key(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: VariableKind> Deserialize<'de> for VariableSlot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = SlotRecord::<T>::deserialize(deserializer)?;
        Ok(Self {
            literal: record.literal,
            reference: record.reference_key.map(VariableRef::detached),
        })
    }
}

// Variable Registry - Owns the variables of a single flowchart
//
// Variables are stored as shared cells so slots can hold non-owning references
// to them. The registry is the only strong owner; removing a variable leaves
// any slot that referenced it stale.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use flowchart_types::{ValueError, Variable, VariableKind, VariableType, VariableValue};

/// Prefix for generated variable keys
const KEY_PREFIX: &str = "Var";

// ─────────────────────────────────────────────────────────────────────────────
// Registry Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from registry operations that address a variable by key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Variable not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Value(#[from] ValueError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Variable Reference
// ─────────────────────────────────────────────────────────────────────────────

type VariableCell = Arc<RwLock<Variable>>;

/// Non-owning, typed reference to a variable in a registry
///
/// The reference keeps the key it was created with so it can still describe
/// itself (and be persisted) after the variable is gone.
pub struct VariableRef<T> {
    key: String,
    cell: Weak<RwLock<Variable>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: VariableKind> VariableRef<T> {
    fn live(key: String, cell: &VariableCell) -> Self {
        Self {
            key,
            cell: Arc::downgrade(cell),
            _kind: PhantomData,
        }
    }

    /// A reference that only knows its key; it resolves once linked
    pub fn detached(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cell: Weak::new(),
            _kind: PhantomData,
        }
    }

    /// Current key of the referenced variable, or the last known key if stale
    pub fn key(&self) -> String {
        match self.cell.upgrade() {
            Some(cell) => cell.read().key().to_string(),
            None => self.key.clone(),
        }
    }

    /// Whether the referenced variable still exists
    pub fn is_live(&self) -> bool {
        self.cell.strong_count() > 0
    }

    /// Read the variable's value; `None` if the variable is gone
    pub fn get(&self) -> Option<T> {
        let cell = self.cell.upgrade()?;
        let guard = cell.read();
        T::from_value(guard.value())
    }

    /// Write the variable's value; `false` if the variable is gone
    pub fn set(&self, value: T) -> bool {
        match self.cell.upgrade() {
            Some(cell) => cell.write().set(value.into_value()).is_ok(),
            None => false,
        }
    }
}

impl<T> Clone for VariableRef<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            cell: self.cell.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for VariableRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRef")
            .field("key", &self.key)
            .field("live", &(self.cell.strong_count() > 0))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variable Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered set of uniquely keyed variables
#[derive(Default)]
pub struct VariableRegistry {
    variables: Vec<VariableCell>,
}

impl VariableRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from existing variables, de-duplicating keys
    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut registry = Self::new();
        for variable in variables {
            registry.insert(variable);
        }
        registry
    }

    /// Add a new variable of type `T` with a generated key
    pub fn register<T: VariableKind>(&mut self) -> String {
        self.register_type(T::TYPE)
    }

    /// Add a new variable of the given type with a generated key
    pub fn register_type(&mut self, ty: VariableType) -> String {
        let key = self.make_unique_key();
        debug!("Registering {} variable {}", ty, key);
        self.variables
            .push(Arc::new(RwLock::new(Variable::with_default(key.clone(), ty))));
        key
    }

    /// Add an existing variable, returning the key it was stored under
    ///
    /// A key already in use is replaced by a generated one.
    pub fn insert(&mut self, mut variable: Variable) -> String {
        if self.contains(variable.key()) {
            let key = self.make_unique_key();
            debug!("Variable key {} already in use, using {}", variable.key(), key);
            variable.set_key(key);
        }
        let key = variable.key().to_string();
        self.variables.push(Arc::new(RwLock::new(variable)));
        key
    }

    /// First `Var<N>` key (smallest N) not used by any variable
    pub fn make_unique_key(&self) -> String {
        self.unique_key_excluding(None)
    }

    /// Like `make_unique_key`, but treats `skip` as free
    fn unique_key_excluding(&self, skip: Option<&str>) -> String {
        let used: HashSet<String> = self
            .variables
            .iter()
            .map(|cell| cell.read().key().to_string())
            .filter(|key| Some(key.as_str()) != skip)
            .collect();

        (0u64..)
            .map(|index| format!("{}{}", KEY_PREFIX, index))
            .find(|key| !used.contains(key))
            .unwrap_or_default()
    }

    /// Look up a typed reference; `None` if the key is unknown or the type differs
    pub fn find<T: VariableKind>(&self, key: &str) -> Option<VariableRef<T>> {
        let cell = self.cell(key)?;
        if cell.read().variable_type() != T::TYPE {
            debug!("Variable {} is not {}", key, T::TYPE);
            return None;
        }
        Some(VariableRef::live(key.to_string(), cell))
    }

    /// Current value of a variable
    pub fn find_value(&self, key: &str) -> Option<VariableValue> {
        self.cell(key).map(|cell| cell.read().value().clone())
    }

    /// Type of a variable
    pub fn variable_type(&self, key: &str) -> Option<VariableType> {
        self.cell(key).map(|cell| cell.read().variable_type())
    }

    /// Overwrite a variable's value
    pub fn set_value(&self, key: &str, value: VariableValue) -> Result<(), RegistryError> {
        let cell = self
            .cell(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        cell.write().set(value)?;
        Ok(())
    }

    /// Change a variable's key, returning the key actually applied
    ///
    /// Returns `None` if `key` is unknown. A `new_key` used by another
    /// variable is replaced by a generated one.
    pub fn rename(&mut self, key: &str, new_key: &str) -> Option<String> {
        let cell = Arc::clone(self.cell(key)?);
        if key == new_key {
            return Some(key.to_string());
        }

        let applied = if self.contains(new_key) {
            let generated = self.unique_key_excluding(Some(key));
            debug!("Variable key {} already in use, using {}", new_key, generated);
            generated
        } else {
            new_key.to_string()
        };

        cell.write().set_key(applied.clone());
        Some(applied)
    }

    /// Remove a variable; references to it become stale
    pub fn remove(&mut self, key: &str) -> Option<Variable> {
        let index = self
            .variables
            .iter()
            .position(|cell| cell.read().key() == key)?;
        let cell = self.variables.remove(index);
        debug!("Removed variable {}", key);

        Some(match Arc::try_unwrap(cell) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => shared.read().clone(),
        })
    }

    /// Check if a key is in use
    pub fn contains(&self, key: &str) -> bool {
        self.cell(key).is_some()
    }

    /// All keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|cell| cell.read().key().to_string())
            .collect()
    }

    /// Copy of every variable in insertion order
    pub fn snapshot(&self) -> Vec<Variable> {
        self.variables.iter().map(|cell| cell.read().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn cell(&self, key: &str) -> Option<&VariableCell> {
        self.variables.iter().find(|cell| cell.read().key() == key)
    }
}

impl std::fmt::Debug for VariableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

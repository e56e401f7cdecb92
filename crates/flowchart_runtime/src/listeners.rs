// Listener Registry - Resolves persisted bindings to callables
//
// Commands persist `ListenerBinding`s (target + method names). The host
// registers the actual callbacks here; dispatch looks them up by binding.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;

use flowchart_types::{InvokeMode, ListenerBinding, VariableValue};

// ─────────────────────────────────────────────────────────────────────────────
// Listener Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned by a listener callback
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Result type for listener callbacks
pub type ListenerResult = Result<(), ListenerError>;

/// Why a single listener did not complete during dispatch
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    #[error("no listener registered")]
    Unbound,

    #[error("listener takes {expected} but was given {actual}")]
    SignatureMismatch {
        expected: InvokeMode,
        actual: InvokeMode,
    },

    #[error("listener failed: {0}")]
    Failed(#[from] ListenerError),

    #[error("listener panicked: {0}")]
    Panicked(String),
}

/// A listener that did not complete, and why
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{binding}: {reason}")]
pub struct ListenerFailure {
    pub binding: ListenerBinding,
    pub reason: FailureReason,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener
// ─────────────────────────────────────────────────────────────────────────────

type StaticFn = Arc<dyn Fn() -> ListenerResult + Send + Sync>;
type ValueFn<T> = Arc<dyn Fn(T) -> ListenerResult + Send + Sync>;

/// A registered callback, typed by the parameter it accepts
#[derive(Clone)]
pub enum Listener {
    Static(StaticFn),
    Boolean(ValueFn<bool>),
    Integer(ValueFn<i64>),
    Float(ValueFn<f64>),
    String(ValueFn<String>),
}

impl Listener {
    /// The invoke mode whose argument this listener accepts
    pub fn mode(&self) -> InvokeMode {
        match self {
            Listener::Static(_) => InvokeMode::Static,
            Listener::Boolean(_) => InvokeMode::Boolean,
            Listener::Integer(_) => InvokeMode::Integer,
            Listener::Float(_) => InvokeMode::Float,
            Listener::String(_) => InvokeMode::String,
        }
    }

    /// Invoke with an argument, isolating errors and panics
    pub fn call(&self, argument: Option<&VariableValue>) -> Result<(), FailureReason> {
        let actual = argument
            .map(|value| InvokeMode::from(value.variable_type()))
            .unwrap_or(InvokeMode::Static);
        if actual != self.mode() {
            return Err(FailureReason::SignatureMismatch {
                expected: self.mode(),
                actual,
            });
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| match (self, argument) {
            (Listener::Static(f), None) => f(),
            (Listener::Boolean(f), Some(VariableValue::Boolean(v))) => f(*v),
            (Listener::Integer(f), Some(VariableValue::Integer(v))) => f(*v),
            (Listener::Float(f), Some(VariableValue::Float(v))) => f(*v),
            (Listener::String(f), Some(VariableValue::String(v))) => f(v.clone()),
            // Ruled out by the mode check above
            _ => Ok(()),
        }));

        match outcome {
            Ok(result) => result.map_err(FailureReason::Failed),
            Err(payload) => Err(FailureReason::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", self.mode())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Table of callbacks addressable by `ListenerBinding`
///
/// Registration goes through `&self` so a registry shared with running
/// commands can still be extended by the host.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<ListenerBinding, Listener>,
}

impl ListenerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, replacing any previous one for the binding
    pub fn register(&self, binding: ListenerBinding, listener: Listener) {
        self.listeners.insert(binding, listener);
    }

    /// Register a listener that takes no parameter
    pub fn register_static<F>(&self, target: &str, method: &str, func: F) -> ListenerBinding
    where
        F: Fn() -> ListenerResult + Send + Sync + 'static,
    {
        self.insert(target, method, Listener::Static(Arc::new(func)))
    }

    /// Register a listener taking a boolean
    pub fn register_boolean<F>(&self, target: &str, method: &str, func: F) -> ListenerBinding
    where
        F: Fn(bool) -> ListenerResult + Send + Sync + 'static,
    {
        self.insert(target, method, Listener::Boolean(Arc::new(func)))
    }

    /// Register a listener taking an integer
    pub fn register_integer<F>(&self, target: &str, method: &str, func: F) -> ListenerBinding
    where
        F: Fn(i64) -> ListenerResult + Send + Sync + 'static,
    {
        self.insert(target, method, Listener::Integer(Arc::new(func)))
    }

    /// Register a listener taking a float
    pub fn register_float<F>(&self, target: &str, method: &str, func: F) -> ListenerBinding
    where
        F: Fn(f64) -> ListenerResult + Send + Sync + 'static,
    {
        self.insert(target, method, Listener::Float(Arc::new(func)))
    }

    /// Register a listener taking a string
    pub fn register_string<F>(&self, target: &str, method: &str, func: F) -> ListenerBinding
    where
        F: Fn(String) -> ListenerResult + Send + Sync + 'static,
    {
        self.insert(target, method, Listener::String(Arc::new(func)))
    }

    /// Remove a listener
    pub fn unregister(&self, binding: &ListenerBinding) -> bool {
        self.listeners.remove(binding).is_some()
    }

    /// Get the listener for a binding
    pub fn get(&self, binding: &ListenerBinding) -> Option<Listener> {
        self.listeners.get(binding).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, binding: &ListenerBinding) -> bool {
        self.listeners.contains_key(binding)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn insert(&self, target: &str, method: &str, listener: Listener) -> ListenerBinding {
        let binding = ListenerBinding::new(target, method);
        self.register(binding.clone(), listener);
        binding
    }
}

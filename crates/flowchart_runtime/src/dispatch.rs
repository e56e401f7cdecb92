//! Invoke Event Command
//!
//! A `DispatchCommand` calls a list of bound listeners, optionally passing a
//! single parameter taken from a [`VariableSlot`]. The invoke mode picks which
//! slot and which listener list are used; the others are kept but ignored.
//!
//! # Lifecycle
//!
//! - `activate` with no delay dispatches immediately
//! - `activate` with a delay schedules a one-shot task and returns at once;
//!   the parameter is resolved when the task fires
//! - cancelling or dropping the command cancels every pending task

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use flowchart_types::{InvokeMode, ListenerBinding, VariableKind, VariableValue};

use crate::command::{ButtonColor, Command, CommandInfo};
use crate::listeners::{FailureReason, ListenerFailure, ListenerRegistry};
use crate::registry::VariableRegistry;
use crate::scheduler::{Scheduler, TimerId};
use crate::slot::VariableSlot;

// ─────────────────────────────────────────────────────────────────────────────
// Persisted Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Parameter slots, one per typed invoke mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeSlots {
    #[serde(rename = "Boolean", default)]
    pub boolean: VariableSlot<bool>,
    #[serde(rename = "Integer", default)]
    pub integer: VariableSlot<i64>,
    #[serde(rename = "Float", default)]
    pub float: VariableSlot<f64>,
    #[serde(rename = "String", default)]
    pub string: VariableSlot<String>,
}

impl ModeSlots {
    /// Link every slot against a registry; `false` if any reference is unresolved
    pub fn link(&mut self, registry: &VariableRegistry) -> bool {
        let results = [
            self.boolean.link(registry),
            self.integer.link(registry),
            self.float.link(registry),
            self.string.link(registry),
        ];
        results.iter().all(|linked| *linked)
    }
}

/// Listener bindings, one ordered list per invoke mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeListeners {
    #[serde(rename = "Static", default)]
    pub static_calls: Vec<ListenerBinding>,
    #[serde(rename = "Boolean", default)]
    pub boolean: Vec<ListenerBinding>,
    #[serde(rename = "Integer", default)]
    pub integer: Vec<ListenerBinding>,
    #[serde(rename = "Float", default)]
    pub float: Vec<ListenerBinding>,
    #[serde(rename = "String", default)]
    pub string: Vec<ListenerBinding>,
}

impl ModeListeners {
    pub fn for_mode(&self, mode: InvokeMode) -> &[ListenerBinding] {
        match mode {
            InvokeMode::Static => &self.static_calls,
            InvokeMode::Boolean => &self.boolean,
            InvokeMode::Integer => &self.integer,
            InvokeMode::Float => &self.float,
            InvokeMode::String => &self.string,
        }
    }

    pub fn for_mode_mut(&mut self, mode: InvokeMode) -> &mut Vec<ListenerBinding> {
        match mode {
            InvokeMode::Static => &mut self.static_calls,
            InvokeMode::Boolean => &mut self.boolean,
            InvokeMode::Integer => &mut self.integer,
            InvokeMode::Float => &mut self.float,
            InvokeMode::String => &mut self.string,
        }
    }
}

/// Everything an invoke command persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: InvokeMode,
    /// Seconds to wait before calling the listeners
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub slots: ModeSlots,
    #[serde(default)]
    pub listeners: ModeListeners,
}

impl DispatchConfig {
    pub fn new(mode: InvokeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Append a listener to the list of the current mode
    pub fn with_listener(mut self, binding: ListenerBinding) -> Self {
        self.listeners.for_mode_mut(self.mode).push(binding);
        self
    }

    /// The slot and listener list of the active mode
    pub fn active(&self) -> ActiveBinding<'_> {
        let listeners = self.listeners.for_mode(self.mode);
        match self.mode {
            InvokeMode::Static => ActiveBinding::Static { listeners },
            InvokeMode::Boolean => ActiveBinding::Boolean {
                parameter: &self.slots.boolean,
                listeners,
            },
            InvokeMode::Integer => ActiveBinding::Integer {
                parameter: &self.slots.integer,
                listeners,
            },
            InvokeMode::Float => ActiveBinding::Float {
                parameter: &self.slots.float,
                listeners,
            },
            InvokeMode::String => ActiveBinding::String {
                parameter: &self.slots.string,
                listeners,
            },
        }
    }

    /// Delay as a duration; `None` when the command should fire immediately
    pub fn effective_delay(&self) -> Option<Duration> {
        if self.delay.is_finite() && self.delay > 0.0 {
            Duration::try_from_secs_f32(self.delay).ok()
        } else {
            None
        }
    }

    /// `"<Mode> <n> methods"`, counting configured listeners of the active mode
    pub fn summarize(&self) -> String {
        format!("{} {} methods", self.mode, self.active().listeners().len())
    }
}

/// Borrowed view of the active mode's parameter and listeners
#[derive(Debug, Clone, Copy)]
pub enum ActiveBinding<'a> {
    Static {
        listeners: &'a [ListenerBinding],
    },
    Boolean {
        parameter: &'a VariableSlot<bool>,
        listeners: &'a [ListenerBinding],
    },
    Integer {
        parameter: &'a VariableSlot<i64>,
        listeners: &'a [ListenerBinding],
    },
    Float {
        parameter: &'a VariableSlot<f64>,
        listeners: &'a [ListenerBinding],
    },
    String {
        parameter: &'a VariableSlot<String>,
        listeners: &'a [ListenerBinding],
    },
}

impl<'a> ActiveBinding<'a> {
    pub fn mode(&self) -> InvokeMode {
        match self {
            ActiveBinding::Static { .. } => InvokeMode::Static,
            ActiveBinding::Boolean { .. } => InvokeMode::Boolean,
            ActiveBinding::Integer { .. } => InvokeMode::Integer,
            ActiveBinding::Float { .. } => InvokeMode::Float,
            ActiveBinding::String { .. } => InvokeMode::String,
        }
    }

    pub fn listeners(&self) -> &'a [ListenerBinding] {
        match *self {
            ActiveBinding::Static { listeners }
            | ActiveBinding::Boolean { listeners, .. }
            | ActiveBinding::Integer { listeners, .. }
            | ActiveBinding::Float { listeners, .. }
            | ActiveBinding::String { listeners, .. } => listeners,
        }
    }

    /// Resolve the parameter now; `None` in static mode
    pub fn argument(&self) -> Option<VariableValue> {
        match self {
            ActiveBinding::Static { .. } => None,
            ActiveBinding::Boolean { parameter, .. } => Some(parameter.resolve().into_value()),
            ActiveBinding::Integer { parameter, .. } => Some(parameter.resolve().into_value()),
            ActiveBinding::Float { parameter, .. } => Some(parameter.resolve().into_value()),
            ActiveBinding::String { parameter, .. } => Some(parameter.resolve().into_value()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch Results
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub mode: InvokeMode,
    /// The argument passed to listeners, `None` in static mode
    pub argument: Option<VariableValue>,
    /// Listeners that completed
    pub invoked: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    /// Whether every listener completed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What `activate` did
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Listeners were called before `activate` returned
    Dispatched(DispatchReport),
    /// Listeners will be called when the timer fires
    Scheduled(TimerId),
}

/// Whether a command has deliveries outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Scheduled,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch Command
// ─────────────────────────────────────────────────────────────────────────────

struct CommandShared {
    config: RwLock<DispatchConfig>,
    listeners: Arc<ListenerRegistry>,
    /// Outstanding activations; the timer id is filled in once scheduled
    pending: Mutex<HashMap<u64, Option<TimerId>>>,
    next_activation: AtomicU64,
}

impl CommandShared {
    fn dispatch(&self) -> DispatchReport {
        // Resolve under the lock, call listeners without it
        let (mode, argument, bindings) = {
            let config = self.config.read();
            let active = config.active();
            (active.mode(), active.argument(), active.listeners().to_vec())
        };

        let mut report = DispatchReport {
            mode,
            argument,
            invoked: 0,
            failures: Vec::new(),
        };

        for binding in bindings {
            let outcome = match self.listeners.get(&binding) {
                Some(listener) => listener.call(report.argument.as_ref()),
                None => Err(FailureReason::Unbound),
            };
            match outcome {
                Ok(()) => report.invoked += 1,
                Err(reason) => {
                    warn!("Listener {} failed: {}", binding, reason);
                    report.failures.push(ListenerFailure { binding, reason });
                }
            }
        }

        debug!(
            "Dispatched {} to {} listeners ({} failed)",
            mode,
            report.invoked,
            report.failures.len()
        );
        report
    }
}

/// Runtime instance of an invoke command
pub struct DispatchCommand {
    shared: Arc<CommandShared>,
    scheduler: Arc<dyn Scheduler>,
}

impl DispatchCommand {
    /// Create a command; slots are used as given (see [`link`](Self::link))
    pub fn new(
        config: DispatchConfig,
        listeners: Arc<ListenerRegistry>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            shared: Arc::new(CommandShared {
                config: RwLock::new(config),
                listeners,
                pending: Mutex::new(HashMap::new()),
                next_activation: AtomicU64::new(0),
            }),
            scheduler,
        }
    }

    /// Dispatch now, or schedule a dispatch after the configured delay
    pub fn activate(&self) -> Activation {
        let delay = self.shared.config.read().effective_delay();
        match delay {
            None => Activation::Dispatched(self.shared.dispatch()),
            Some(delay) => Activation::Scheduled(self.schedule(delay)),
        }
    }

    /// Call every listener of the active mode with the current parameter value
    pub fn dispatch(&self) -> DispatchReport {
        self.shared.dispatch()
    }

    fn schedule(&self, delay: Duration) -> TimerId {
        let activation = self.shared.next_activation.fetch_add(1, Ordering::Relaxed);
        self.shared.pending.lock().insert(activation, None);

        let weak: Weak<CommandShared> = Arc::downgrade(&self.shared);
        let timer = self.scheduler.schedule(
            delay,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let still_pending = shared.pending.lock().remove(&activation).is_some();
                if still_pending {
                    shared.dispatch();
                }
            }),
        );

        if let Some(entry) = self.shared.pending.lock().get_mut(&activation) {
            *entry = Some(timer);
        }
        debug!("Scheduled dispatch {} in {:?}", timer, delay);
        timer
    }

    /// Cancel every pending delayed dispatch, returning how many were pending
    pub fn cancel_pending(&self) -> usize {
        let drained: Vec<Option<TimerId>> =
            self.shared.pending.lock().drain().map(|(_, timer)| timer).collect();
        for timer in drained.iter().flatten() {
            self.scheduler.cancel(*timer);
        }
        if !drained.is_empty() {
            debug!("Cancelled {} pending dispatches", drained.len());
        }
        drained.len()
    }

    pub fn state(&self) -> DispatchState {
        if self.shared.pending.lock().is_empty() {
            DispatchState::Idle
        } else {
            DispatchState::Scheduled
        }
    }

    /// Number of delayed dispatches waiting to fire
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn summarize(&self) -> String {
        self.shared.config.read().summarize()
    }

    /// Copy of the current configuration
    pub fn config(&self) -> DispatchConfig {
        self.shared.config.read().clone()
    }

    /// Edit the configuration in place
    pub fn update<R>(&self, edit: impl FnOnce(&mut DispatchConfig) -> R) -> R {
        edit(&mut *self.shared.config.write())
    }

    /// Resolve slot references against a registry
    pub fn link(&self, registry: &VariableRegistry) -> bool {
        self.shared.config.write().slots.link(registry)
    }
}

impl Drop for DispatchCommand {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl std::fmt::Debug for DispatchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCommand")
            .field("config", &*self.shared.config.read())
            .field("state", &self.state())
            .finish()
    }
}

static INVOKE_EVENT_INFO: CommandInfo = CommandInfo {
    category: "Scripting",
    name: "Invoke Event",
    description: "Calls a list of bound methods, passing at most one boolean, integer, float \
                  or string parameter taken from a constant or a variable.",
};

impl Command for DispatchCommand {
    fn info(&self) -> &'static CommandInfo {
        &INVOKE_EVENT_INFO
    }

    fn enter(&self) {
        self.activate();
    }

    fn summary(&self) -> String {
        self.summarize()
    }

    fn button_color(&self) -> ButtonColor {
        ButtonColor::rgba(235, 191, 217, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FrameClock, TokioScheduler};
    use flowchart_types::Variable;

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn record_integer(listeners: &ListenerRegistry, log: &CallLog, name: &str) -> ListenerBinding {
        let log = Arc::clone(log);
        let label = name.to_string();
        listeners.register_integer("Test", name, move |value| {
            log.lock().push(format!("{}({})", label, value));
            Ok(())
        })
    }

    fn score_command(
        delay: f32,
        score: i64,
    ) -> (DispatchCommand, VariableRegistry, Arc<FrameClock>, CallLog) {
        let clock = Arc::new(FrameClock::new());
        let (command, registry, log) = score_command_on(delay, score, clock.clone());
        (command, registry, clock, log)
    }

    fn score_command_on(
        delay: f32,
        score: i64,
        scheduler: Arc<dyn Scheduler>,
    ) -> (DispatchCommand, VariableRegistry, CallLog) {
        let mut registry = VariableRegistry::new();
        registry.insert(Variable::new("Score", score));

        let listeners = Arc::new(ListenerRegistry::new());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let l1 = record_integer(&listeners, &log, "L1");
        let l2 = record_integer(&listeners, &log, "L2");

        let mut config = DispatchConfig::new(InvokeMode::Integer)
            .with_delay(delay)
            .with_listener(l1)
            .with_listener(l2);
        config.slots.integer.bind(registry.find("Score").unwrap());

        let command = DispatchCommand::new(config, listeners, scheduler);
        (command, registry, log)
    }

    #[test]
    fn test_immediate_dispatch_in_order() {
        let (command, _registry, clock, log) = score_command(0.0, 5);

        let activation = command.activate();
        assert!(matches!(activation, Activation::Dispatched(ref r) if r.invoked == 2));
        assert_eq!(*log.lock(), vec!["L1(5)", "L2(5)"]);
        assert_eq!(clock.pending(), 0);
        assert_eq!(command.state(), DispatchState::Idle);
    }

    #[test]
    fn test_delayed_dispatch_resolves_at_fire_time() {
        let (command, registry, clock, log) = score_command(2.0, 5);

        assert!(matches!(command.activate(), Activation::Scheduled(_)));
        assert!(log.lock().is_empty());
        assert_eq!(command.state(), DispatchState::Scheduled);

        registry.set_value("Score", VariableValue::Integer(7)).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(log.lock().is_empty());

        clock.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), vec!["L1(7)", "L2(7)"]);
        assert_eq!(command.state(), DispatchState::Idle);

        clock.advance(Duration::from_secs(5));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_drop_cancels_scheduled_dispatch() {
        let (command, _registry, clock, log) = score_command(2.0, 5);

        command.activate();
        clock.advance(Duration::from_secs(1));
        drop(command);

        assert_eq!(clock.pending(), 0);
        clock.advance(Duration::from_secs(5));
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_tokio_timer() {
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let (command, _registry, log) = score_command_on(2.0, 5, scheduler.clone());

        assert!(matches!(command.activate(), Activation::Scheduled(_)));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(command);
        assert_eq!(scheduler.pending(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_dispatches_when_kept() {
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let (command, registry, log) = score_command_on(2.0, 5, scheduler.clone());

        command.activate();
        registry.set_value("Score", VariableValue::Integer(9)).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(*log.lock(), vec!["L1(9)", "L2(9)"]);
        assert_eq!(command.state(), DispatchState::Idle);
    }

    #[test]
    fn test_cancel_pending() {
        let (command, _registry, clock, log) = score_command(1.5, 5);

        command.activate();
        command.activate();
        assert_eq!(command.pending(), 2);
        assert_eq!(command.cancel_pending(), 2);

        clock.advance(Duration::from_secs(2));
        assert!(log.lock().is_empty());
        assert_eq!(command.state(), DispatchState::Idle);
    }

    #[test]
    fn test_static_without_listeners_is_a_no_op() {
        let command = DispatchCommand::new(
            DispatchConfig::default(),
            Arc::new(ListenerRegistry::new()),
            Arc::new(FrameClock::new()),
        );

        let report = command.dispatch();
        assert_eq!(report.mode, InvokeMode::Static);
        assert_eq!(report.argument, None);
        assert_eq!(report.invoked, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_failing_listener_does_not_stop_fan_out() {
        let listeners = Arc::new(ListenerRegistry::new());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = Arc::clone(&log);
            listeners.register_static("A", "First", move || {
                log.lock().push("first".to_string());
                Ok(())
            })
        };
        let erroring = listeners.register_static("B", "Errors", || Err("boom".into()));
        let panicking = listeners.register_static("C", "Panics", || panic!("kaboom"));
        let missing = ListenerBinding::new("D", "Missing");
        let last = {
            let log = Arc::clone(&log);
            listeners.register_static("E", "Last", move || {
                log.lock().push("last".to_string());
                Ok(())
            })
        };

        let config = DispatchConfig::new(InvokeMode::Static)
            .with_listener(first)
            .with_listener(erroring.clone())
            .with_listener(panicking.clone())
            .with_listener(missing.clone())
            .with_listener(last);
        let command = DispatchCommand::new(config, listeners, Arc::new(FrameClock::new()));

        let report = command.dispatch();
        assert_eq!(*log.lock(), vec!["first", "last"]);
        assert_eq!(report.invoked, 2);
        let failed: Vec<_> = report.failures.iter().map(|f| f.binding.clone()).collect();
        assert_eq!(failed, vec![erroring, panicking, missing]);
        assert_eq!(report.failures[2].reason, FailureReason::Unbound);
    }

    #[test]
    fn test_only_active_mode_is_used() {
        let listeners = Arc::new(ListenerRegistry::new());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let int_listener = record_integer(&listeners, &log, "Int");
        let text_listener = {
            let log = Arc::clone(&log);
            listeners.register_string("Test", "Text", move |value| {
                log.lock().push(format!("Text({})", value));
                Ok(())
            })
        };

        let mut config = DispatchConfig::new(InvokeMode::Integer).with_listener(int_listener);
        config.slots.integer = VariableSlot::literal(3);
        config.mode = InvokeMode::String;
        config = config.with_listener(text_listener);
        config.slots.string = VariableSlot::literal("hello".to_string());

        let command = DispatchCommand::new(config, listeners, Arc::new(FrameClock::new()));
        command.dispatch();
        assert_eq!(*log.lock(), vec!["Text(hello)"]);

        command.update(|config| config.mode = InvokeMode::Integer);
        command.dispatch();
        assert_eq!(*log.lock(), vec!["Text(hello)", "Int(3)"]);
    }

    #[test]
    fn test_summary_counts_active_listeners() {
        let config = DispatchConfig::new(InvokeMode::Float)
            .with_listener(ListenerBinding::new("A", "a"))
            .with_listener(ListenerBinding::new("B", "b"));
        assert_eq!(config.summarize(), "Float 2 methods");

        let mut config = config;
        config.mode = InvokeMode::Static;
        assert_eq!(config.summarize(), "Static 0 methods");
    }

    #[test]
    fn test_negative_or_nan_delay_is_immediate() {
        assert_eq!(DispatchConfig::default().with_delay(-1.0).effective_delay(), None);
        assert_eq!(DispatchConfig::default().with_delay(f32::NAN).effective_delay(), None);
        assert_eq!(
            DispatchConfig::default().with_delay(0.5).effective_delay(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_config_round_trip_keeps_inactive_modes() {
        let mut config = DispatchConfig::new(InvokeMode::Boolean)
            .with_delay(1.0)
            .with_listener(ListenerBinding::new("Light", "SetOn"));
        config.slots.string = VariableSlot::literal("kept".to_string());
        config.listeners.string.push(ListenerBinding::new("Log", "Write"));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mode"], "Boolean");
        assert_eq!(json["slots"]["String"]["literal"], "kept");
        assert_eq!(json["listeners"]["Boolean"][0]["method"], "SetOn");

        let back: DispatchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.slots.string.resolve(), "kept");
        assert_eq!(back.listeners, config.listeners);
        assert_eq!(back.delay, 1.0);
    }

    #[test]
    fn test_command_trait() {
        let (command, _registry, _clock, log) = score_command(0.0, 1);
        assert_eq!(command.info().name, "Invoke Event");
        assert_eq!(command.summary(), "Integer 2 methods");
        assert_eq!(command.button_color(), ButtonColor::rgba(235, 191, 217, 255));

        command.enter();
        assert_eq!(log.lock().len(), 2);
    }
}

//! Host Scheduling
//!
//! Commands never sleep. A delayed command hands a one-shot task to the host's
//! scheduler and keeps the returned `TimerId` so it can cancel the task later.
//!
//! Two schedulers are provided:
//! - [`FrameClock`]: driven by the host's frame loop via [`FrameClock::advance`]
//! - [`TokioScheduler`]: sleeps on a tokio runtime

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Work run once when a timer fires
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer service provided by the host
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerId;

    /// Cancel a pending task; `false` if it already ran or was never scheduled
    fn cancel(&self, id: TimerId) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame Clock
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    /// Pending tasks ordered by due time, then scheduling order
    queue: BTreeMap<(Duration, TimerId), ScheduledTask>,
    due: HashMap<TimerId, Duration>,
}

/// Scheduler driven by explicit time steps
///
/// The host calls [`advance`](FrameClock::advance) once per frame. Time only
/// moves when advanced, which also makes delays deterministic in tests.
#[derive(Default)]
pub struct FrameClock {
    state: Mutex<ClockState>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks waiting to fire
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Move time forward by `dt`, running every task that falls due
    ///
    /// Tasks run in due order without the clock locked, so they may schedule
    /// or cancel further tasks. Returns the number of tasks run.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.state.lock().now + dt;
        let mut fired = 0;

        loop {
            let task = {
                let mut state = self.state.lock();
                let Some(entry) = state.queue.first_entry() else {
                    break;
                };
                if entry.key().0 > target {
                    break;
                }
                let ((due, id), task) = entry.remove_entry();
                state.due.remove(&id);
                state.now = due;
                trace!("Firing {} at {:?}", id, due);
                task
            };
            task();
            fired += 1;
        }

        self.state.lock().now = target;
        fired
    }
}

impl Scheduler for FrameClock {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;

        let due = state.now + delay;
        state.queue.insert((due, id), task);
        state.due.insert(id, due);
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.state.lock();
        match state.due.remove(&id) {
            Some(due) => state.queue.remove(&(due, id)).is_some(),
            None => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokio Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduler spawning one sleeping task per timer on a tokio runtime
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    /// Present while the timer is pending; the abort handle is filled in
    /// right after spawning
    timers: Arc<DashMap<TimerId, Option<AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            timers: Arc::new(DashMap::new()),
        }
    }

    /// Scheduler on the runtime of the calling context, if there is one
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.timers.insert(id, None);

        let timers = Arc::clone(&self.timers);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if timers.remove(&id).is_some() {
                task();
            }
        });

        if let Some(mut entry) = self.timers.get_mut(&id) {
            *entry = Some(join.abort_handle());
        }
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some((_, abort)) => {
                if let Some(abort) = abort {
                    abort.abort();
                }
                true
            }
            None => false,
        }
    }
}

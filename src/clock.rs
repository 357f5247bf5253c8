//! Time source abstraction
//!
//! The scheduler, budget tracker and processor never call `Local::now()`
//! directly; they read the time through a [`Clock`] so tests can pin it.

use chrono::{Duration, Local, NaiveDateTime};
use std::sync::{Arc, RwLock};

/// Provides the current local wall-clock time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> NaiveDateTime;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<NaiveDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, instant: NaiveDateTime) {
        match self.now.write() {
            Ok(mut guard) => *guard = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    /// Advance the clock by `delta`
    pub fn advance(&self, delta: Duration) {
        let next = self.now() + delta;
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Shared system clock
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

//! Rolling usage budget
//!
//! Usage is counted in micro-units (millionths of a currency unit) so that
//! repeated flat costs add up exactly. The window resets lazily: only a
//! budget check looks at the clock.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clock::SharedClock;

const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Convert a currency amount to micro-units
pub fn to_micros(amount: f64) -> u64 {
    if amount.is_finite() && amount > 0.0 {
        (amount * MICROS_PER_UNIT).round() as u64
    } else {
        0
    }
}

/// Convert micro-units back to a currency amount
pub fn from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_UNIT
}

/// Snapshot of usage counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    /// Successful calls since the client was created
    pub request_count: u64,

    /// Usage in the current window
    pub usage: f64,

    /// Cap for one window
    pub budget: f64,

    /// Start of the current window
    pub window_start: NaiveDateTime,
}

#[derive(Debug)]
struct BudgetState {
    usage_micros: u64,
    request_count: u64,
    window_start: NaiveDateTime,
}

/// Usage accumulator with a cap and a fixed-length window
pub struct BudgetTracker {
    state: Mutex<BudgetState>,
    cap_micros: u64,
    cost_micros: u64,
    window: Duration,
    clock: SharedClock,
}

impl BudgetTracker {
    /// Create a tracker with a 24 hour window starting now
    pub fn new(budget: f64, cost_per_call: f64, clock: SharedClock) -> Self {
        let window_start = clock.now();
        Self {
            state: Mutex::new(BudgetState {
                usage_micros: 0,
                request_count: 0,
                window_start,
            }),
            cap_micros: to_micros(budget),
            cost_micros: to_micros(cost_per_call),
            window: Duration::hours(24),
            clock,
        }
    }

    /// Override the window length
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether another call fits in the budget, resetting an elapsed window
    pub fn check_budget(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();

        if now - state.window_start >= self.window {
            tracing::info!(
                previous_usage = from_micros(state.usage_micros),
                "Budget window elapsed, resetting usage"
            );
            state.usage_micros = 0;
            state.window_start = now;
            return true;
        }

        state.usage_micros < self.cap_micros
    }

    /// Count one successful call at the flat per-call cost
    pub fn record_call(&self) -> u64 {
        let mut state = self.lock();
        state.request_count += 1;
        state.usage_micros = state.usage_micros.saturating_add(self.cost_micros);
        state.request_count
    }

    /// Usage in the current window, in micro-units
    pub fn usage_micros(&self) -> u64 {
        self.lock().usage_micros
    }

    /// Read-only counter snapshot
    pub fn stats(&self) -> UsageStats {
        let state = self.lock();
        UsageStats {
            request_count: state.request_count,
            usage: from_micros(state.usage_micros),
            budget: from_micros(self.cap_micros),
            window_start: state.window_start,
        }
    }
}

impl std::fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetTracker")
            .field("cap_micros", &self.cap_micros)
            .field("cost_micros", &self.cost_micros)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

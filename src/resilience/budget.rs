//! Wall-Clock Budgets
//!
//! A `TimeBudget` is a deadline threaded through a multi-step operation.
//! Each step asks for the remaining budget before it starts; nothing is ever
//! started once the deadline has passed.

use std::time::Duration;

use tokio::time::Instant;

/// Deadline allocated to a multi-step operation
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    deadline: Instant,
    total: Duration,
}

impl TimeBudget {
    /// Start a budget of `total` from now
    pub fn new(total: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + total,
            total,
        }
    }

    /// Budget that is already exhausted
    pub fn exhausted() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Time left before the deadline (zero once passed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Whether at least `needed` remains
    pub fn has_at_least(&self, needed: Duration) -> bool {
        !self.is_exhausted() && self.remaining() >= needed
    }

    /// Clamp a per-call timeout so it never outlives the budget
    pub fn cap(&self, timeout: Duration) -> Duration {
        timeout.min(self.remaining())
    }

    /// Narrow this budget to at most `ceiling` from now
    pub fn narrowed(&self, ceiling: Duration) -> Self {
        let deadline = self.deadline.min(Instant::now() + ceiling);
        Self {
            started: self.started,
            deadline,
            total: deadline.saturating_duration_since(self.started),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

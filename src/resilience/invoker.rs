//! Resilient Invoker
//!
//! Timeout + bounded retry combinator applied uniformly at every external
//! call site (source fetch, model call, storage write).
//!
//! ## Strategy
//!
//! 1. Run the operation under the per-attempt timeout
//! 2. On failure, stop immediately if the error is not retryable
//!    (auth, validation, configuration)
//! 3. Otherwise sleep `base_delay * backoff_factor^attempt` (capped) and retry
//! 4. After `max_attempts`, surface the last observed error
//!
//! The only side effect is logging.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

use super::budget::TimeBudget;
use super::timeout::with_timeout;
use crate::constants::retry as retry_constants;
use crate::types::{FlowError, Result};

/// Immutable retry/timeout configuration for one kind of call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f32,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
            max_delay: Duration::from_millis(retry_constants::MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f32) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same policy with the per-attempt timeout clamped to the budget
    pub fn capped(&self, budget: &TimeBudget) -> Self {
        self.with_timeout(budget.cap(self.timeout))
    }

    /// Delay slept after the 0-based `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let scaled_ms = (base_ms * f64::from(self.backoff_factor).powi(attempt as i32)).round();
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(scaled_ms.min(max_ms) as u64)
    }

    /// Sum of all delays slept when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.backoff_factor)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Timeout + bounded-retry wrapper around fallible async operations
#[derive(Debug, Clone, Copy)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out
    ///
    /// `op` is called once per attempt and must build a fresh future each
    /// time (and, for writes, a fresh object name).
    pub async fn invoke<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = self.policy;
        let attempts = AtomicU32::new(0);

        let attempt = || {
            let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                operation,
                attempt = n,
                max_attempts = policy.max_attempts,
                timeout_ms = policy.timeout.as_millis() as u64,
                "Invoking"
            );
            with_timeout(policy.timeout, op(), operation)
        };

        let result = attempt
            .retry(policy.backoff())
            .when(|err: &FlowError| err.is_retryable())
            .notify(|err: &FlowError, delay: Duration| {
                warn!(
                    operation,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying after backoff"
                );
            })
            .await;

        if let Err(err) = &result {
            warn!(
                operation,
                attempts = attempts.load(Ordering::Relaxed),
                category = %err.category(),
                error = %err,
                "Operation failed"
            );
        }

        result
    }
}

/// Convenience wrapper: invoke `op` once under `policy`
pub async fn invoke<T, F, Fut>(policy: RetryPolicy, operation: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    ResilientInvoker::new(policy).invoke(operation, op).await
}

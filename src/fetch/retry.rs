//! Dual-budget retry policy.
//!
//! Timeouts and generic transport failures are counted separately. Timeouts
//! back off linearly against the larger budget; everything else backs off
//! exponentially (capped) against the smaller one.

use std::time::Duration;

use crate::config::ContextConfig;
use crate::error::FetchError;

/// Base unit for both backoff curves.
const BASE_DELAY: Duration = Duration::from_millis(1000);
/// Cap on the exponential curve.
const MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Which retry budget an error draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Abort, elapsed deadline, or a message naming a timeout.
    Timeout,
    /// Everything else.
    Generic,
}

impl ErrorClass {
    /// Classifies a transport-level failure.
    #[must_use]
    pub fn of(err: &FetchError) -> Self {
        if matches!(err, FetchError::Timeout { .. }) {
            return Self::Timeout;
        }
        let message = err.to_string().to_lowercase();
        if message.contains("timeout") || message.contains("timed out") || message.contains("abort")
        {
            Self::Timeout
        } else {
            Self::Generic
        }
    }
}

/// Retry bounds, copied from [`ContextConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Budget for [`ErrorClass::Generic`].
    pub max_retries: u32,
    /// Budget for [`ErrorClass::Timeout`].
    pub max_timeout_retries: u32,
}

impl RetryPolicy {
    /// Extracts the retry bounds from the configuration.
    #[must_use]
    pub const fn from_config(config: &ContextConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_timeout_retries: config.max_timeout_retries,
        }
    }

    /// Linear backoff: `1s * n`.
    #[must_use]
    pub fn timeout_delay(n: u32) -> Duration {
        BASE_DELAY.saturating_mul(n)
    }

    /// Exponential backoff capped at 10s: `min(10s, 1s * 2^n)`.
    #[must_use]
    pub fn generic_delay(n: u32) -> Duration {
        2u32.checked_pow(n)
            .map_or(MAX_DELAY, |factor| BASE_DELAY.saturating_mul(factor))
            .min(MAX_DELAY)
    }
}

/// What the loop should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    Retry(Duration),
    /// The matching budget is spent.
    Exhausted,
}

/// Per-call counters. Never shared between fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Generic failures seen so far.
    pub retry_count: u32,
    /// Timeout failures seen so far.
    pub timeout_retry_count: u32,
}

impl RetryState {
    /// True while either budget still has room.
    #[must_use]
    pub const fn has_budget(&self, policy: &RetryPolicy) -> bool {
        self.retry_count < policy.max_retries
            || self.timeout_retry_count < policy.max_timeout_retries
    }

    /// Total failed attempts across both classes.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.retry_count + self.timeout_retry_count
    }

    /// Records a failure of `class` and decides whether to retry.
    pub fn record(&mut self, class: ErrorClass, policy: &RetryPolicy) -> RetryDecision {
        match class {
            ErrorClass::Timeout => {
                self.timeout_retry_count += 1;
                if self.timeout_retry_count < policy.max_timeout_retries {
                    RetryDecision::Retry(RetryPolicy::timeout_delay(self.timeout_retry_count))
                } else {
                    RetryDecision::Exhausted
                }
            }
            ErrorClass::Generic => {
                self.retry_count += 1;
                if self.retry_count < policy.max_retries {
                    RetryDecision::Retry(RetryPolicy::generic_delay(self.retry_count))
                } else {
                    RetryDecision::Exhausted
                }
            }
        }
    }
}

//! Bounded fixed-interval reconnection policy

use std::time::Duration;

/// What to do after a failed connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    RetryAfter(Duration),
    /// The attempt bound is reached; wait for an explicit connect
    Exhausted,
}

/// Counts consecutive failed attempts against a fixed bound
///
/// The count includes the attempt that started the sequence, so a bound of
/// five allows five attempts in total before giving up. Any successful open
/// resets it.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    interval: Duration,
    max_attempts: u32,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            failures: 0,
        }
    }

    /// Record a failed attempt and decide whether to retry
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.failures < self.max_attempts {
            RetryDecision::RetryAfter(self.interval)
        } else {
            RetryDecision::Exhausted
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Start a fresh sequence (explicit connect or credential change)
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

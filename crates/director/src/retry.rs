//! Bounded polling policy for Director task output

use std::time::Duration;

/// How long to wait before and between polls of a Director task
///
/// The first poll happens after `initial_delay`. A failed attempt `n`
/// (1-based) is followed by a sleep of `step * n` before the next one.
/// There is no sleep after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests against local stubs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_attempts,
            step: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt`, or `None` if it was the last one
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.step * attempt)
    }
}

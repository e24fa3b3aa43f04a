//! Retry logic.
//!
//! # Responsibilities
//! - Decide after each attempt whether to stop, give up, or wait and retry
//! - Bound total attempts to `max_attempts + 1`
//!
//! # Design Decisions
//! - Only handled failures are retried
//! - Success and unhandled failures stop immediately
//! - Breaker rejections never reach this layer as retryable outcomes

use std::time::Duration;

use crate::resilience::backoff::Backoff;
use crate::resilience::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts beyond the first.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The outcome is final (success or unhandled failure).
    Done,
    /// Wait, then try again.
    RetryAfter(Duration),
    /// Handled failure with no budget left.
    Exhausted,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts, backoff }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Backoff::constant(Duration::ZERO))
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }

    /// `attempt` is the 1-based number of the attempt that just finished.
    pub fn decide(&self, attempt: u32, outcome: Outcome) -> RetryDecision {
        match outcome {
            Outcome::Success | Outcome::UnhandledFailure => RetryDecision::Done,
            Outcome::HandledFailure if attempt <= self.max_attempts => {
                RetryDecision::RetryAfter(self.backoff.delay(attempt))
            }
            Outcome::HandledFailure => RetryDecision::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_retries_means_three_attempts_with_exponential_delays() {
        let policy = RetryPolicy::new(2, Backoff::exponential(Duration::from_millis(500)));
        assert_eq!(policy.total_attempts(), 3);
        assert_eq!(
            policy.decide(1, Outcome::HandledFailure),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(
            policy.decide(2, Outcome::HandledFailure),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
        assert_eq!(policy.decide(3, Outcome::HandledFailure), RetryDecision::Exhausted);
    }

    #[test]
    fn success_and_unhandled_stop_immediately() {
        let policy = RetryPolicy::new(5, Backoff::constant(Duration::from_millis(10)));
        assert_eq!(policy.decide(1, Outcome::Success), RetryDecision::Done);
        assert_eq!(policy.decide(1, Outcome::UnhandledFailure), RetryDecision::Done);
    }

    #[test]
    fn no_retry_policy_gives_up_after_first_failure() {
        assert_eq!(RetryPolicy::none().decide(1, Outcome::HandledFailure), RetryDecision::Exhausted);
    }
}

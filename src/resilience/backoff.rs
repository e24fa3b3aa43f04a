//! Retry backoff: constant or exponential, optional cap and jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth pattern of the delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Constant,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub kind: BackoffKind,
    pub base: Duration,
    /// Upper bound applied before jitter.
    pub max: Option<Duration>,
    /// Adds 0-10% random jitter when set.
    pub jitter: bool,
}

impl Backoff {
    pub fn constant(base: Duration) -> Self {
        Self { kind: BackoffKind::Constant, base, max: None, jitter: false }
    }

    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential, base, max: None, jitter: false }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before retry number `retry` (the first retry is 1).
    ///
    /// Exponential: `base * 2^(retry-1)`. Constant: `base`.
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let raw = match self.kind {
            BackoffKind::Constant => self.base,
            BackoffKind::Exponential => {
                let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
                self.base.checked_mul(factor).unwrap_or(Duration::MAX)
            }
        };

        let capped = match self.max {
            Some(max) => raw.min(max),
            None => raw,
        };

        if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let range_ms = u64::try_from(delay.as_millis() / 10).unwrap_or(u64::MAX);
    if range_ms == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..range_ms);
    delay.saturating_add(Duration::from_millis(jitter))
}

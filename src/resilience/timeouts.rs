//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a single attempt (per-attempt scope)
//! - Bound a whole execution, retries and delays included (total scope)
//! - Cancel in-flight work cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities, so paused test clocks apply
//! - Expiry drops the guarded future and cancels its token for any work the
//!   operation spawned
//! - Timeout errors carry their scope

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// The two independent timeout scopes of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSpec {
    pub attempt: Duration,
    pub total: Duration,
}

/// The guarded future did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub after: Duration,
}

/// Race `fut` against `limit`; on expiry drop it and cancel `token`.
pub async fn guard<F>(limit: Duration, token: &CancellationToken, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => Ok(output),
        Err(_) => {
            token.cancel();
            Err(Elapsed { after: limit })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_future_completes() {
        let token = CancellationToken::new();
        let out = guard(Duration::from_secs(1), &token, async { 7 }).await;
        assert_eq!(out, Ok(7));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_is_cut_off_and_token_cancelled() {
        let token = CancellationToken::new();
        let started = tokio::time::Instant::now();
        let out = guard(Duration::from_secs(2), &token, tokio::time::sleep(Duration::from_secs(3))).await;

        assert_eq!(out, Err(Elapsed { after: Duration::from_secs(2) }));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert!(token.is_cancelled());
    }
}

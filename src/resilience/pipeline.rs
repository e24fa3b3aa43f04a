//! Pipeline composition.
//!
//! # Responsibilities
//! - Run one operation through TotalTimeout(Breaker(Retry(AttemptTimeout(op))))
//! - Tag every non-value ending with its taxonomy member
//! - Record exactly one call per execution in the stats tracker
//!
//! # Design Decisions
//! - The breaker is consulted before every attempt, retries included
//! - A retry is skipped when the circuit is already Open
//! - Caller cancellation wins over every nested wait and is reported as
//!   `Cancelled`, never as a timeout

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::schema::PipelineConfig;
use crate::observability::metrics;
use crate::observability::stats::StatsTracker;
use crate::resilience::backoff::{Backoff, BackoffKind};
use crate::resilience::circuit_breaker::{BreakerOptions, CircuitBreaker, CircuitObserver, CircuitState};
use crate::resilience::error::{PipelineError, TimeoutScope};
use crate::resilience::outcome::{AttemptResult, Classifier, Outcome};
use crate::resilience::retries::{RetryDecision, RetryPolicy};
use crate::resilience::timeouts::{self, TimeoutSpec};

/// Everything tunable about one named pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub breaker: BreakerOptions,
    pub retry: RetryPolicy,
    pub timeouts: TimeoutSpec,
    pub classifier: Classifier,
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let cb = &config.circuit_breaker;
        let retry = &config.retry;

        let base = Duration::from_millis(retry.base_delay_ms);
        let mut backoff = match retry.backoff {
            BackoffKind::Constant => Backoff::constant(base),
            BackoffKind::Exponential => Backoff::exponential(base),
        };
        if let Some(max_ms) = retry.max_delay_ms {
            backoff = backoff.with_max(Duration::from_millis(max_ms));
        }
        if retry.jitter {
            backoff = backoff.with_jitter();
        }

        Self {
            breaker: BreakerOptions {
                sampling_duration: Duration::from_millis(cb.sampling_duration_ms),
                failure_ratio: cb.failure_ratio,
                minimum_throughput: cb.minimum_throughput,
                break_duration: Duration::from_millis(cb.break_duration_ms),
            },
            retry: RetryPolicy::new(retry.max_attempts, backoff),
            timeouts: TimeoutSpec {
                attempt: Duration::from_millis(config.timeouts.attempt_timeout_ms),
                total: Duration::from_millis(config.timeouts.total_timeout_ms),
            },
            classifier: Classifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Handed to the operation on every attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub pipeline: Arc<str>,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Cancelled when this attempt times out or the execution ends.
    pub cancel: CancellationToken,
}

enum AttemptEnd<T, E> {
    Value(T),
    Error(E),
    TimedOut,
}

type Settled<T, E> = (Result<T, PipelineError<E>>, bool);

/// One named breaker + retry + timeout composition.
#[derive(Debug)]
pub struct Pipeline {
    name: Arc<str>,
    options: PipelineOptions,
    breaker: CircuitBreaker,
    stats: StatsTracker,
}

impl Pipeline {
    pub fn new(
        name: &str,
        options: PipelineOptions,
        observer: Arc<dyn CircuitObserver>,
        stats: StatsTracker,
    ) -> Self {
        let breaker = CircuitBreaker::new(name, options.breaker, observer);
        Self { name: Arc::from(name), options, breaker, stats }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, PipelineError<E>>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: StdError + 'static,
    {
        self.execute_with_cancel(&CancellationToken::new(), op).await
    }

    /// Execute `op`, aborting every nested wait as soon as `cancel` fires.
    pub async fn execute_with_cancel<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, PipelineError<E>>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: StdError + 'static,
    {
        let started = Instant::now();
        let scope = cancel.child_token();
        let _cancel_on_exit = scope.clone().drop_guard();
        let total = self.options.timeouts.total;

        let (result, success) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(pipeline = %self.name, "Execution cancelled by caller");
                (Err(PipelineError::Cancelled { pipeline: self.name.to_string() }), false)
            }
            settled = tokio::time::timeout(total, self.run_attempts(&scope, op)) => match settled {
                Ok(settled) => settled,
                Err(_) => {
                    tracing::warn!(pipeline = %self.name, total = ?total, "Total execution timeout elapsed");
                    (Err(self.timed_out(TimeoutScope::Total, total)), false)
                }
            },
        };

        self.stats.record_call(&self.name, success);
        let label = match &result {
            Ok(_) if success => "success",
            Ok(_) => "unhandled_value",
            Err(e) => e.kind(),
        };
        metrics::record_call(&self.name, label, started.elapsed());

        result
    }

    async fn run_attempts<T, E, F, Fut>(&self, scope: &CancellationToken, mut op: F) -> Settled<T, E>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: StdError + 'static,
    {
        let attempt_limit = self.options.timeouts.attempt;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(rejection) => {
                    tracing::debug!(
                        pipeline = %self.name,
                        attempt,
                        retry_after = ?rejection.retry_after,
                        "Call rejected by open circuit"
                    );
                    return (Err(self.circuit_open(rejection.retry_after)), false);
                }
            };

            metrics::record_attempt(&self.name);
            let token = scope.child_token();
            let ctx = AttemptContext { pipeline: self.name.clone(), attempt, cancel: token.clone() };

            let end = match timeouts::guard(attempt_limit, &token, op(ctx)).await {
                Ok(Ok(value)) => AttemptEnd::Value(value),
                Ok(Err(err)) => AttemptEnd::Error(err),
                Err(_) => AttemptEnd::TimedOut,
            };
            let outcome = {
                let view = match &end {
                    AttemptEnd::Value(value) => AttemptResult::Value(value),
                    AttemptEnd::Error(err) => AttemptResult::Error(err),
                    AttemptEnd::TimedOut => AttemptResult::TimedOut,
                };
                self.options.classifier.classify(&view)
            };
            permit.record(outcome);

            tracing::debug!(pipeline = %self.name, attempt, outcome = ?outcome, "Attempt finished");

            match self.options.retry.decide(attempt, outcome) {
                RetryDecision::Done => return self.finish(outcome, end),
                RetryDecision::Exhausted => {
                    tracing::warn!(pipeline = %self.name, attempts = attempt, "Retries exhausted");
                    return (Err(self.exhausted(attempt, end)), false);
                }
                RetryDecision::RetryAfter(delay) => {
                    drop(end);
                    if self.breaker.state() == CircuitState::Open {
                        tracing::debug!(pipeline = %self.name, attempt, "Circuit open, not retrying");
                        return (Err(self.circuit_open(self.options.breaker.break_duration)), false);
                    }
                    tracing::info!(pipeline = %self.name, attempt, delay = ?delay, "Retrying after handled failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn finish<T, E>(&self, outcome: Outcome, end: AttemptEnd<T, E>) -> Settled<T, E> {
        let success = outcome == Outcome::Success;
        match end {
            AttemptEnd::Value(value) => (Ok(value), success),
            AttemptEnd::Error(err) => (Err(PipelineError::Unhandled(err)), false),
            AttemptEnd::TimedOut => (Err(self.timed_out(TimeoutScope::Attempt, self.options.timeouts.attempt)), false),
        }
    }

    fn exhausted<T, E>(&self, attempts: u32, end: AttemptEnd<T, E>) -> PipelineError<E> {
        match end {
            AttemptEnd::TimedOut => self.timed_out(TimeoutScope::Attempt, self.options.timeouts.attempt),
            AttemptEnd::Error(err) => PipelineError::RetriesExhausted {
                pipeline: self.name.to_string(),
                attempts,
                last: Some(err),
            },
            AttemptEnd::Value(_) => PipelineError::RetriesExhausted {
                pipeline: self.name.to_string(),
                attempts,
                last: None,
            },
        }
    }

    fn circuit_open<E>(&self, retry_after: Duration) -> PipelineError<E> {
        PipelineError::CircuitOpen { pipeline: self.name.to_string(), retry_after }
    }

    fn timed_out<E>(&self, scope: TimeoutScope, after: Duration) -> PipelineError<E> {
        PipelineError::TimedOut { pipeline: self.name.to_string(), scope, after }
    }
}

//! Named pipeline registry.
//!
//! # Responsibilities
//! - Hold the per-name pipeline definitions
//! - Lazily construct each pipeline on first use and reuse it afterwards,
//!   so breaker state survives across calls
//! - Own the stats tracker shared by every pipeline
//!
//! # Design Decisions
//! - Owned by the composition root and passed around by `Arc`, not a global
//! - Sharded by name (DashMap): unrelated pipelines never contend
//! - Unknown names are an error; there is no fallback definition

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::schema::ServiceConfig;
use crate::downstream;
use crate::observability::stats::{PipelineStats, StatsTracker};
use crate::resilience::backoff::BackoffKind;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitObserver, CircuitState, NoopObserver};
use crate::resilience::error::PipelineError;
use crate::resilience::pipeline::{AttemptContext, Pipeline, PipelineOptions};

/// Stats, breaker and policy view of one pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub name: String,
    pub circuit: BreakerSnapshot,
    pub stats: PipelineStats,
    pub policy: PolicySummary,
}

/// The tunables a pipeline runs with, in config units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicySummary {
    pub sampling_duration_ms: u64,
    pub failure_ratio: f64,
    pub minimum_throughput: u32,
    pub break_duration_ms: u64,
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub base_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
    pub jitter: bool,
    pub attempt_timeout_ms: u64,
    pub total_timeout_ms: u64,
}

impl From<&PipelineOptions> for PolicySummary {
    fn from(options: &PipelineOptions) -> Self {
        let backoff = &options.retry.backoff;
        Self {
            sampling_duration_ms: millis(options.breaker.sampling_duration),
            failure_ratio: options.breaker.failure_ratio,
            minimum_throughput: options.breaker.minimum_throughput,
            break_duration_ms: millis(options.breaker.break_duration),
            max_attempts: options.retry.max_attempts,
            backoff: backoff.kind,
            base_delay_ms: millis(backoff.base),
            max_delay_ms: backoff.max.map(millis),
            jitter: backoff.jitter,
            attempt_timeout_ms: millis(options.timeouts.attempt),
            total_timeout_ms: millis(options.timeouts.total),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub struct PipelineRegistry {
    definitions: DashMap<String, PipelineOptions>,
    pipelines: DashMap<String, Arc<Pipeline>>,
    stats: StatsTracker,
    observer: Arc<dyn CircuitObserver>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    pub fn with_observer(observer: Arc<dyn CircuitObserver>) -> Self {
        Self {
            definitions: DashMap::new(),
            pipelines: DashMap::new(),
            stats: StatsTracker::new(),
            observer,
        }
    }

    /// Register every configured pipeline. Pipelines with a `downstream_url`
    /// use the HTTP status classifier.
    pub fn from_config(config: &ServiceConfig, observer: Arc<dyn CircuitObserver>) -> Self {
        let registry = Self::with_observer(observer);
        for (name, pipeline) in &config.pipelines {
            let mut options = PipelineOptions::from_config(pipeline);
            if pipeline.downstream_url.is_some() {
                options = options.with_classifier(downstream::http_classifier());
            }
            registry.register(name, options);
        }
        tracing::info!(pipelines = registry.definitions.len(), "Pipeline registry initialized");
        registry
    }

    /// Define (or redefine) a pipeline. Redefining drops the constructed
    /// instance, and with it the breaker state; stats are kept.
    pub fn register(&self, name: &str, options: PipelineOptions) {
        self.definitions.insert(name.to_string(), options);
        if self.pipelines.remove(name).is_some() {
            tracing::info!(pipeline = %name, "Pipeline redefined, circuit state reset");
        }
    }

    /// Resolve a pipeline by name, constructing it on first use.
    pub fn pipeline(&self, name: &str) -> Option<Arc<Pipeline>> {
        if let Some(existing) = self.pipelines.get(name) {
            return Some(existing.value().clone());
        }

        let options = self.definitions.get(name)?.value().clone();
        let entry = self.pipelines.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(pipeline = %name, "Constructing pipeline");
            Arc::new(Pipeline::new(name, options, self.observer.clone(), self.stats.clone()))
        });
        Some(entry.value().clone())
    }

    pub async fn execute<T, E, F, Fut>(&self, name: &str, op: F) -> Result<T, PipelineError<E>>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: StdError + 'static,
    {
        self.execute_with_cancel(name, &CancellationToken::new(), op).await
    }

    pub async fn execute_with_cancel<T, E, F, Fut>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, PipelineError<E>>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: 'static,
        E: StdError + 'static,
    {
        match self.pipeline(name) {
            Some(pipeline) => pipeline.execute_with_cancel(cancel, op).await,
            None => {
                tracing::warn!(pipeline = %name, "Execution requested for unknown pipeline");
                Err(PipelineError::UnknownPipeline(name.to_string()))
            }
        }
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Defined pipeline names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Option<PipelineSnapshot> {
        let pipeline = self.pipeline(name)?;
        Some(PipelineSnapshot {
            name: name.to_string(),
            circuit: pipeline.breaker().snapshot(),
            stats: self.stats.get_stats(name),
            policy: PolicySummary::from(pipeline.options()),
        })
    }

    /// Force the named breaker Closed. Returns the state it left, or `None`
    /// for an unknown name. Stats are untouched.
    pub fn reset(&self, name: &str) -> Option<CircuitState> {
        let pipeline = self.pipeline(name)?;
        Some(pipeline.breaker().reset())
    }

    /// Reset every defined pipeline; returns each one's previous state.
    pub fn reset_all(&self) -> BTreeMap<String, CircuitState> {
        self.names()
            .into_iter()
            .filter_map(|name| self.reset(&name).map(|previous| (name, previous)))
            .collect()
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

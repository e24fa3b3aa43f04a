use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tokio::time::Instant;

use crate::downstream::DownstreamError;
use crate::observability::stats::PipelineStats;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::error::PipelineError;
use crate::resilience::registry::PipelineSnapshot;

use super::AdminState;

const FALLBACK_RESPONSE: &str = "Default/cached response from fallback";

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub pipelines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Result of one `/api/call/{name}` invocation.
#[derive(Debug, Serialize)]
pub struct CallReport {
    pub pipeline: String,
    pub status: &'static str,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_response: Option<&'static str>,
    pub stats: PipelineStats,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        pipelines: state.registry.names(),
    })
}

pub async fn get_dashboard(State(state): State<AdminState>) -> Json<BTreeMap<String, PipelineStats>> {
    Json(state.registry.stats().dashboard())
}

pub async fn get_pipeline(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<PipelineSnapshot>, (StatusCode, Json<ErrorBody>)> {
    state
        .registry
        .snapshot(&name)
        .map(Json)
        .ok_or_else(|| not_found(&name))
}

#[derive(Debug, Serialize)]
pub struct ResetReport {
    pub pipeline: String,
    pub action: &'static str,
    pub old_state: CircuitState,
    pub new_state: CircuitState,
}

/// Force one breaker Closed. Stats are not reset.
pub async fn reset_pipeline(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<ResetReport>, (StatusCode, Json<ErrorBody>)> {
    let old_state = state.registry.reset(&name).ok_or_else(|| not_found(&name))?;
    Ok(Json(ResetReport {
        new_state: current_state(&state, &name),
        pipeline: name,
        action: "reset",
        old_state,
    }))
}

pub async fn reset_all(State(state): State<AdminState>) -> Json<BTreeMap<String, ResetReport>> {
    let reports = state
        .registry
        .reset_all()
        .into_iter()
        .map(|(name, old_state)| {
            let report = ResetReport {
                pipeline: name.clone(),
                action: "reset",
                old_state,
                new_state: current_state(&state, &name),
            };
            (name, report)
        })
        .collect();
    Json(reports)
}

fn current_state(state: &AdminState, name: &str) -> CircuitState {
    state
        .registry
        .pipeline(name)
        .map(|p| p.breaker().state())
        .unwrap_or(CircuitState::Closed)
}

/// Run the named pipeline once against its downstream. Failures are reported
/// in the body with a fallback, not as HTTP errors.
pub async fn call_pipeline(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<CallReport>, (StatusCode, Json<ErrorBody>)> {
    let url = state
        .config
        .pipelines
        .get(&name)
        .and_then(|p| p.downstream_url.clone())
        .ok_or_else(|| not_found(&name))?;

    tracing::info!(pipeline = %name, "Calling downstream");
    let started = Instant::now();
    let client = state.downstream.clone();
    let result = state
        .registry
        .execute(&name, |ctx| {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url, &ctx).await }
        })
        .await;
    let latency_ms = round2(started.elapsed().as_secs_f64() * 1000.0);

    let mut report = CallReport {
        pipeline: name.clone(),
        status: "SUCCESS",
        latency_ms,
        response: None,
        http_code: None,
        error: None,
        fallback_response: None,
        stats: PipelineStats { total_calls: 0, successful: 0, failed: 0, failure_rate_percent: 0.0 },
    };

    match result {
        Ok(body) => {
            tracing::info!(pipeline = %name, latency_ms, "Downstream call succeeded");
            report.response = Some(body);
        }
        Err(err) => {
            tracing::warn!(pipeline = %name, latency_ms, kind = err.kind(), error = %err, "Serving fallback");
            report.status = status_label(&err);
            report.http_code = err.operation_error().and_then(DownstreamError::status);
            report.error = Some(describe(&err));
            report.fallback_response = Some(FALLBACK_RESPONSE);
        }
    }
    report.stats = state.registry.stats().get_stats(&name);

    Ok(Json(report))
}

fn status_label(err: &PipelineError<DownstreamError>) -> &'static str {
    match err {
        PipelineError::CircuitOpen { .. } => "CIRCUIT_OPEN",
        PipelineError::TimedOut { .. } => "TIMED_OUT",
        PipelineError::RetriesExhausted { last: Some(DownstreamError::Status { .. }), .. } => "DOWNSTREAM_ERROR",
        _ => "FALLBACK",
    }
}

fn describe(err: &PipelineError<DownstreamError>) -> String {
    match err.operation_error() {
        Some(cause) => format!("{err}: {cause}"),
        None => err.to_string(),
    }
}

fn not_found(name: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody { error: format!("no pipeline named '{name}' is configured") }),
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! HTTP client for pipeline downstreams.

use std::time::Duration;

use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::resilience::outcome::{AttemptResult, Classifier, Outcome};
use crate::resilience::pipeline::AttemptContext;

/// Header carrying the 1-based attempt number to the downstream.
pub const ATTEMPT_HEADER: &str = "x-pipeline-attempt";

#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("downstream returned {status}")]
    Status { status: u16, body: String },

    #[error("attempt {attempt} cancelled")]
    Cancelled { attempt: u32 },
}

impl DownstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DownstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownstreamClient {
    http: reqwest::Client,
}

impl DownstreamClient {
    pub fn new() -> Self {
        // Timeouts belong to the pipeline; the connect bound only keeps
        // dead hosts from pinning sockets after an attempt is abandoned.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// GET `url` for one attempt. Resolves early with `Cancelled` when the
    /// attempt's token fires.
    pub async fn get(&self, url: &str, ctx: &AttemptContext) -> Result<String, DownstreamError> {
        let request = async {
            let response = self
                .http
                .get(url)
                .header(ATTEMPT_HEADER, HeaderValue::from(ctx.attempt))
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            if status.is_success() {
                Ok(body)
            } else {
                Err(DownstreamError::Status { status: status.as_u16(), body })
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(DownstreamError::Cancelled { attempt: ctx.attempt }),
            result = request => result,
        }
    }
}

impl Default for DownstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport errors, non-success statuses and attempt timeouts are handled
/// failures. Cancellation and foreign error types are not.
pub fn http_classifier() -> Classifier {
    Classifier::new(|attempt| match attempt {
        AttemptResult::Value(_) => Outcome::Success,
        AttemptResult::TimedOut => Outcome::HandledFailure,
        AttemptResult::Error(_) => match attempt.error::<DownstreamError>() {
            Some(DownstreamError::Transport(_)) | Some(DownstreamError::Status { .. }) => {
                Outcome::HandledFailure
            }
            Some(DownstreamError::Cancelled { .. }) | None => Outcome::UnhandledFailure,
        },
    })
}

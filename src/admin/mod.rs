//! Admin and dashboard HTTP surface.
//!
//! # Routes
//! - `GET /admin/status`: version and configured pipelines (bearer-guarded when a key is set)
//! - `GET /api/dashboard`: stats for every known pipeline
//! - `GET /api/pipelines/{name}`: stats, circuit state and policy for one pipeline
//! - `GET /api/pipelines/{name}/reset`, `GET /api/reset-all`: force breakers Closed
//! - `GET /api/call/{name}`: run the pipeline against its downstream once

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::schema::ServiceConfig;
use crate::downstream::DownstreamClient;
use crate::resilience::registry::PipelineRegistry;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<PipelineRegistry>,
    pub downstream: DownstreamClient,
    pub config: Arc<ServiceConfig>,
}

impl AdminState {
    pub fn new(registry: Arc<PipelineRegistry>, config: Arc<ServiceConfig>) -> Self {
        Self { registry, downstream: DownstreamClient::new(), config }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let guarded = Router::new()
        .route("/admin/status", get(get_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(guarded)
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/pipelines/{name}", get(get_pipeline))
        .route("/api/pipelines/{name}/reset", get(reset_pipeline))
        .route("/api/reset-all", get(reset_all))
        .route("/api/call/{name}", get(call_pipeline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the shutdown channel fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Admin API draining");
        })
        .await
}

//! Resilience pipeline service.
//!
//! Loads the pipeline definitions, builds the registry and serves the admin
//! dashboard until Ctrl+C / SIGTERM.
//!
//! ```text
//!     GET /api/call/{name}
//!             │
//!             ▼
//!     ┌───────────────────────────────────────────────┐
//!     │ total timeout                                 │
//!     │   ┌───────────────────────────────────────┐   │
//!     │   │ circuit breaker (checked per attempt) │   │
//!     │   │   ┌───────────────────────────────┐   │   │
//!     │   │   │ retry + backoff               │   │   │
//!     │   │   │   ┌───────────────────────┐   │   │   │       Downstream
//!     │   │   │   │ attempt timeout       │───┼───┼───┼──────▶ service
//!     │   │   │   └───────────────────────┘   │   │   │
//!     │   │   └───────────────────────────────┘   │   │
//!     │   └───────────────────────────────────────┘   │
//!     └───────────────────────────────────────────────┘
//!             │
//!             ▼
//!      stats tracker → /api/dashboard
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use resilience_pipeline::admin::{self, AdminState};
use resilience_pipeline::config::{load_config, ServiceConfig};
use resilience_pipeline::lifecycle::{signals, Shutdown};
use resilience_pipeline::observability::{logging, metrics};
use resilience_pipeline::resilience::{NoopObserver, PipelineRegistry};

#[derive(Parser)]
#[command(name = "resilience-pipeline")]
#[command(about = "Circuit breaker / retry / timeout pipelines with a stats dashboard", long_about = None)]
struct Args {
    /// TOML config file; the built-in demo pipelines are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `admin.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::demo(),
    };
    if let Some(bind) = args.bind {
        config.admin.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "resilience-pipeline starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let registry = Arc::new(PipelineRegistry::from_config(&config, Arc::new(NoopObserver)));
    tracing::info!(pipelines = ?registry.names(), "Configuration loaded");

    if !config.admin.enabled {
        tracing::warn!("Admin API disabled; nothing to serve, waiting for shutdown");
        signals::wait_for_shutdown().await;
        return Ok(());
    }

    let shutdown = Shutdown::new();
    let admin_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown().await;
        trigger.trigger();
    });

    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    let state = AdminState::new(registry, config.clone());
    admin::serve(listener, state, admin_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

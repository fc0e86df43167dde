//! GreenHop API Server

use greenhop_api::{AppState, routes};
use greenhop_config::TelemetryConfig;
use greenhop_scheduler::Scheduler;
use greenhop_store::{JobStore, MemoryJobStore};
use greenhop_telemetry::{CarbonSource, StaticSource, TelemetryProvider};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("GREENHOP_CONFIG").unwrap_or_else(|_| "greenhop.kdl".to_string());
    info!(path = %config_path, "Loading configuration");
    let mut config = greenhop_config::load(&config_path)?;
    if let Ok(bind) = std::env::var("GREENHOP_BIND") {
        config.server.bind = bind;
    }

    let telemetry = Arc::new(TelemetryProvider::new(
        carbon_source(&config.telemetry),
        &config.telemetry,
    ));
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

    // Scheduler runs until the server shuts down
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::from_config(store.clone(), telemetry.clone(), &config);
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    let state = AppState::new(store, telemetry);

    // Build router
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    scheduler_task.await?;
    info!("Server stopped");
    Ok(())
}

/// The configured source, or the static table when it cannot be built
/// (typically missing credentials).
fn carbon_source(config: &TelemetryConfig) -> Arc<dyn CarbonSource> {
    match greenhop_telemetry::from_config(config) {
        Ok(source) => source,
        Err(e) => {
            warn!(
                provider = ?config.provider,
                error = %e,
                "Falling back to static carbon intensities"
            );
            Arc::new(StaticSource::new(config.static_intensities.clone()))
        }
    }
}

async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    let _ = shutdown.send(true);
}

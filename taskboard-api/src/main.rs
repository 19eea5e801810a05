//! Taskboard API Server Entry Point
//!
//! Reads configuration from the environment, builds the router over an
//! in-memory store and serves until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use taskboard_api::telemetry::{init_tracer, TelemetryConfig};
use taskboard_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig};
use taskboard_storage::{MemoryStore, Store};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    let _telemetry = init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let is_production = api_config.is_production();
    auth_config.validate_for_production(is_production)?;
    if is_production {
        api_config.validate_for_production()?;
    }

    let addr = api_config.socket_addr()?;
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let app = create_router(AppState::new(store, auth_config, api_config));

    tracing::info!(%addr, production = is_production, "Starting Taskboard API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

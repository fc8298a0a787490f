//! Web front end: a small JSON API plus a static operator page

pub mod handlers;
pub mod types;

use crate::config::AppConfig;
use crate::Result;
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Default bind address, matching the provider-facing port the
/// original deployment used
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/config-status", get(handlers::config_status))
        .route("/generate", post(handlers::generate))
        .route("/test-proxy", get(handlers::test_proxy))
        .with_state(state)
}

/// Bind and serve the front end until the process exits
pub async fn serve(bind_addr: SocketAddr, config: Arc<AppConfig>) -> Result<()> {
    let app = create_router(AppState { config });

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

//! HTTP surface: chat, dashboard/chart generation, and model settings checks.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use error::ApiError;
pub use state::{AppState, GatewayFactory, bedrock_gateway_factory};

/// Builds the router with CORS for `cors_origins` (`*` or a comma list).
pub fn router(state: Arc<AppState>, cors_origins: &str) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/create_report", post(handlers::create_report))
        .route("/api/create_chart", post(handlers::create_chart))
        .route("/api/settings/model/validate", post(handlers::validate_model))
        .with_state(state)
        .layer(build_cors(cors_origins))
}

pub fn build_cors(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serves `app` until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

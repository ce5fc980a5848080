//! Router configuration for the webhook server.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{receive_webhook, verify_webhook, AppState};

/// Create the webhook router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

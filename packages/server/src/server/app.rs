//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerKernel;
use crate::server::routes::{
    dispatch_handler, enroll_handler, health_handler, sms_webhook_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<ServerKernel>,
    /// Bearer token expected on the internal endpoints.
    pub dispatch_auth_token: String,
}

/// Build the Axum application router
pub fn build_app(kernel: Arc<ServerKernel>, dispatch_auth_token: String) -> Router {
    let state = AppState {
        kernel,
        dispatch_auth_token,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/webhooks/sms", post(sms_webhook_handler))
        .route("/internal/dispatch", post(dispatch_handler))
        .route("/internal/enroll", post(enroll_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

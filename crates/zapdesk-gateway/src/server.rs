// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tokio_util::sync::CancellationToken;

use zapdesk_config::model::ServerConfig;
use zapdesk_core::ZapdeskError;
use zapdesk_engine::Engine;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Engine,
    /// Authentication for management routes.
    pub auth: AuthConfig,
    /// Meta app secret; when set, Meta webhooks must carry a valid signature.
    pub meta_app_secret: Option<String>,
    pub health: HealthState,
    /// Directory served under `/media`.
    pub media_root: Option<PathBuf>,
}

/// Assemble every route.
///
/// - `GET /health`, `GET /metrics` (public)
/// - `GET|POST /webhooks/{provider}` (public; providers cannot authenticate)
/// - `POST /instances/{provider}`, `POST /maintenance/merge-duplicate-contacts` (bearer)
/// - `GET /media/*` (static blob root)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route(
            "/webhooks/{provider}",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/instances/{provider}", post(handlers::instance_action))
        .route(
            "/maintenance/merge-duplicate-contacts",
            post(handlers::merge_duplicate_contacts),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let mut app = Router::new().merge(public_routes).merge(api_routes);
    if let Some(root) = &state.media_root {
        app = app.nest_service("/media", ServeDir::new(root));
    }
    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `cancel` fires, then drain in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ZapdeskError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ZapdeskError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("zapdesk listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ZapdeskError::Internal(format!("server error: {e}")))?;

    Ok(())
}

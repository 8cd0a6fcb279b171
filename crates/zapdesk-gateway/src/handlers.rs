// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Webhook handlers answer 200 for anything short of a broken store so that
//! providers stop redelivering. Management handlers surface errors with a
//! real status code since an operator is waiting on them.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use zapdesk_core::{HealthStatus, PluginAdapter, Provider, ZapdeskError};
use zapdesk_engine::{InstanceRequest, ReconcileReport};
use zapdesk_whatsapp::{verify_signature, verify_subscription};

use crate::server::GatewayState;

/// Body of every webhook and error answer.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: String,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ReconcileReport,
}

fn parse_provider(raw: &str) -> Result<Provider, Response> {
    Provider::from_str(raw).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(WebhookResponse::failed(format!("unknown provider `{raw}`"))),
        )
            .into_response()
    })
}

/// Status code for a failed management call.
pub fn status_for(err: &ZapdeskError) -> StatusCode {
    match err {
        ZapdeskError::Config(_) | ZapdeskError::Payload { .. } => StatusCode::BAD_REQUEST,
        ZapdeskError::NotFound { .. } => StatusCode::NOT_FOUND,
        ZapdeskError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
        ZapdeskError::Provider { .. } | ZapdeskError::Timeout { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ZapdeskError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "management request failed");
    } else {
        warn!(error = %err, "management request rejected");
    }
    (status, Json(WebhookResponse::failed(err.to_string()))).into_response()
}

/// POST /webhooks/{provider}
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provider = match parse_provider(&provider) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if provider == Provider::Meta
        && let Some(secret) = state.meta_app_secret.as_deref().filter(|s| !s.is_empty())
    {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("meta webhook signature mismatch");
            return (
                StatusCode::UNAUTHORIZED,
                Json(WebhookResponse::failed("invalid signature")),
            )
                .into_response();
        }
    }

    match state.engine.webhooks.process(provider, &body).await {
        Ok(report) if report.rejected => {
            (StatusCode::OK, Json(WebhookResponse::failed("unrecognized payload"))).into_response()
        }
        Ok(_) => (StatusCode::OK, Json(WebhookResponse::ok())).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookResponse::failed(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /webhooks/{provider}
///
/// Only Meta uses this, for the `hub.challenge` subscription handshake.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match parse_provider(&provider) {
        Ok(Provider::Meta) => {}
        Ok(_) => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
        Err(resp) => return resp,
    }

    let expected = match state.engine.webhooks.meta_verify_token().await {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!("meta verification attempted but no verify token is configured");
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(e) => {
            error!(error = %e, "could not load meta verify token");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        &expected,
    ) {
        Some(challenge) => (StatusCode::OK, challenge.to_string()).into_response(),
        None => {
            warn!("meta verification token mismatch");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /instances/{provider}
pub async fn instance_action(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
    Json(request): Json<InstanceRequest>,
) -> Response {
    let provider = match parse_provider(&provider) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.engine.instances.execute(provider, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /maintenance/merge-duplicate-contacts
pub async fn merge_duplicate_contacts(State(state): State<GatewayState>) -> Response {
    match state.engine.reconciler.run().await {
        Ok(report) => (
            StatusCode::OK,
            Json(ReconcileResponse {
                success: true,
                report,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let (code, storage) = match state.engine.store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Degraded(why)) => (StatusCode::OK, format!("degraded: {why}")),
        Ok(HealthStatus::Unhealthy(why)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {why}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };
    let body = HealthResponse {
        status: if code == StatusCode::OK { "ok" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

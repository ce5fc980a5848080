//! WebSub callback handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::web::error::ApiError;

/// Query parameters of a hub verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    /// `subscribe`, `unsubscribe` or `denied`.
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    /// Topic being verified.
    #[serde(rename = "hub.topic")]
    pub topic: Option<String>,
    /// Token to echo back.
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
    /// Granted lease in seconds.
    #[serde(rename = "hub.lease_seconds")]
    pub lease_seconds: Option<String>,
    /// Reason given by the hub for a denied subscription.
    #[serde(rename = "hub.reason")]
    pub reason: Option<String>,
}

/// Acknowledgement returned for every content delivery.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `ok`, `duplicate`, `ignored` or `error`.
    pub status: &'static str,
    /// Error detail for `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /webhook - Hub verification of intent.
///
/// Echoes `hub.challenge` verbatim as a plain-text body.
pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.mode.as_deref() == Some("denied") {
        tracing::warn!(
            topic = query.topic.as_deref().unwrap_or("-"),
            reason = query.reason.as_deref().unwrap_or("-"),
            "hub denied subscription"
        );
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            String::new(),
        ));
    }

    let challenge = query.challenge.ok_or_else(|| {
        tracing::warn!("verification request without hub.challenge");
        ApiError::bad_request("missing hub.challenge")
    })?;

    if let Some(lease) = query.lease_seconds.as_deref() {
        tracing::debug!(lease_seconds = lease, "hub granted lease");
    }

    let body = state
        .relay
        .verify(&challenge, query.mode.as_deref(), query.topic.as_deref());

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}

/// POST /webhook - Content delivery from the hub.
///
/// Always answers 200; the JSON status says what happened. A body that
/// cannot be read (e.g. over the size limit) is reported as `error`.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookResponse> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::warn!(
                status = %rejection.status(),
                error = %message,
                "unreadable webhook body"
            );
            return Json(WebhookResponse {
                status: "error",
                message: Some(message),
            });
        }
    };

    let outcome = state.relay.deliver(&body).await;
    Json(WebhookResponse {
        status: outcome.status(),
        message: outcome.message().map(str::to_string),
    })
}

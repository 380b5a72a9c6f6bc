//! Inbound request validation.
//!
//! A delivery is only dispatched once it has a JSON content type, a body that
//! parses as JSON and an `X-GitHub-Event` header. Validation happens before
//! signature verification; both must pass.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use policy::{DeliveryId, InstallationId};
use serde_json::Value;
use thiserror::Error;

/// Header naming the webhook event.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying GitHub's per-delivery GUID.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Why a request was rejected before dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The content type is absent or not a JSON media type.
    #[error("unsupported content type '{0}'; expected application/json")]
    UnsupportedContentType(String),

    /// The body is not valid JSON.
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),

    /// `X-GitHub-Event` is absent or empty.
    #[error("missing X-GitHub-Event header")]
    MissingEvent,
}

/// A validated webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Correlation id (`X-GitHub-Delivery`, or generated).
    pub delivery: DeliveryId,
    /// Event name, e.g. `code_scanning_alert`.
    pub event: String,
    /// The payload's `action`, when present.
    pub action: Option<String>,
    /// Parsed payload.
    pub payload: Value,
    /// Raw body exactly as received; signatures are computed over these bytes.
    pub body: Bytes,
    /// Request headers.
    pub headers: HeaderMap,
}

impl WebhookEvent {
    /// `event.action`, or just `event` when the payload has no action.
    pub fn qualified_name(&self) -> String {
        match &self.action {
            Some(action) => format!("{}.{}", self.event, action),
            None => self.event.clone(),
        }
    }

    /// The installation the delivery was sent for.
    pub fn installation_id(&self) -> Option<InstallationId> {
        self.payload
            .pointer("/installation/id")
            .and_then(Value::as_u64)
            .map(InstallationId::new)
    }
}

/// Validates headers and body and builds a [`WebhookEvent`].
///
/// # Errors
///
/// See [`ValidationError`]. Checks run in order: content type, JSON body,
/// event header.
pub fn validate_request(headers: &HeaderMap, body: Bytes) -> Result<WebhookEvent, ValidationError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json_media_type(content_type) {
        return Err(ValidationError::UnsupportedContentType(
            content_type.to_string(),
        ));
    }

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingEvent)?
        .to_string();

    let delivery = DeliveryId::from_header(headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok()));
    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(WebhookEvent {
        delivery,
        event,
        action,
        payload,
        body,
        headers: headers.clone(),
    })
}

/// `application/json` or any `application/*+json`, parameters ignored.
fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

//! Webhook handlers wiring alert events to the triage engine.
//!
//! | Key | Handler |
//! |-----|---------|
//! | `code_scanning_alert.created` | [`AlertOpenedHandler`] |
//! | `code_scanning_alert.appeared_in_branch` | [`AlertOpenedHandler`] |
//! | `code_scanning_alert.reopened` | [`AlertOpenedHandler`] |
//! | `code_scanning_alert.closed_by_user` | [`AlertDismissedHandler`] |
//! | `secret_scanning_alert.resolved` | [`AlertDismissedHandler`] |
//! | `dependabot_alert.dismissed` | [`AlertDismissedHandler`] |

use std::sync::Arc;

use async_trait::async_trait;
use policy::{AlertKind, AlertRecord, GatewayError, PolicyConfig, TriageEngine, TriageOutcome};
use serde_json::Value;
use tracing::warn;

use crate::registry::{HandlerError, HandlerRegistry, RequestContext, WebhookHandler};

/// Keys routed to [`AlertOpenedHandler`].
pub const OPENED_KEYS: &[&str] = &[
    "code_scanning_alert.created",
    "code_scanning_alert.appeared_in_branch",
    "code_scanning_alert.reopened",
];

/// Keys routed to [`AlertDismissedHandler`].
pub const DISMISSED_KEYS: &[&str] = &[
    "code_scanning_alert.closed_by_user",
    "secret_scanning_alert.resolved",
    "dependabot_alert.dismissed",
];

/// Runs the alert-opened flow.
#[derive(Debug, Clone)]
pub struct AlertOpenedHandler {
    policy: Arc<PolicyConfig>,
}

impl AlertOpenedHandler {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl WebhookHandler for AlertOpenedHandler {
    fn id(&self) -> &str {
        "alert_opened"
    }

    async fn handle(&self, ctx: &RequestContext<'_>) -> Result<Value, HandlerError> {
        let Some(alert) = alert_record(ctx) else {
            return Ok(Value::String(format!(
                "Ignored: '{}' is not an alert event",
                ctx.event.event
            )));
        };
        let engine = TriageEngine::new(&self.policy, ctx.gateway);
        report(self.id(), engine.on_alert_opened(&alert).await)
    }
}

/// Runs the alert-dismissed flow.
#[derive(Debug, Clone)]
pub struct AlertDismissedHandler {
    policy: Arc<PolicyConfig>,
}

impl AlertDismissedHandler {
    pub fn new(policy: Arc<PolicyConfig>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl WebhookHandler for AlertDismissedHandler {
    fn id(&self) -> &str {
        "alert_dismissed"
    }

    async fn handle(&self, ctx: &RequestContext<'_>) -> Result<Value, HandlerError> {
        let Some(alert) = alert_record(ctx) else {
            return Ok(Value::String(format!(
                "Ignored: '{}' is not an alert event",
                ctx.event.event
            )));
        };
        let engine = TriageEngine::new(&self.policy, ctx.gateway);
        report(self.id(), engine.on_alert_dismissed(&alert).await)
    }
}

/// Builds the registry the server runs with.
pub fn triage_registry(policy: Arc<PolicyConfig>) -> HandlerRegistry {
    let opened: Arc<dyn WebhookHandler> = Arc::new(AlertOpenedHandler::new(Arc::clone(&policy)));
    let dismissed: Arc<dyn WebhookHandler> = Arc::new(AlertDismissedHandler::new(policy));

    let mut registry = HandlerRegistry::new();
    for key in OPENED_KEYS {
        registry.register(*key, Arc::clone(&opened));
    }
    for key in DISMISSED_KEYS {
        registry.register(*key, Arc::clone(&dismissed));
    }
    registry
}

fn alert_record(ctx: &RequestContext<'_>) -> Option<AlertRecord> {
    let kind = AlertKind::from_event(&ctx.event.event)?;
    Some(AlertRecord::from_payload(kind, &ctx.event.payload))
}

/// Turns an engine result into the handler's reported value.
///
/// Authentication failures abort the delivery; any other gateway error is
/// reported as a failure message and the delivery still succeeds.
fn report(
    handler: &str,
    result: Result<TriageOutcome, GatewayError>,
) -> Result<Value, HandlerError> {
    match result {
        Ok(outcome) => Ok(Value::String(outcome.to_string())),
        Err(error) if error.is_fatal() => Err(HandlerError::Fatal {
            handler: handler.to_string(),
            message: error.to_string(),
        }),
        Err(error) => {
            warn!(handler, %error, "GitHub call failed while handling alert");
            Ok(Value::String(format!("Failed: {error}")))
        }
    }
}

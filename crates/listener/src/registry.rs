//! Handler registry and dispatch.
//!
//! Handlers register under either a bare event name (`code_scanning_alert`)
//! or a qualified `event.action` key (`code_scanning_alert.created`). A
//! delivery runs the bare-event handlers first, then the qualified ones, each
//! group in registration order. Every handler's result is collected under its
//! id; the report is `HIT` when at least one handler ran and `MISS` otherwise.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use policy::AlertGateway;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::request::WebhookEvent;

/// Everything a handler can see for one delivery.
pub struct RequestContext<'a> {
    /// The validated delivery.
    pub event: &'a WebhookEvent,
    /// The delivery's GitHub session. Dropped when dispatch returns.
    pub gateway: &'a dyn AlertGateway,
}

/// A failure that aborts the whole dispatch.
///
/// Recoverable problems are reported inside the handler's result value instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The delivery cannot be processed at all (e.g. App authentication failed).
    #[error("handler '{handler}' failed: {message}")]
    Fatal {
        /// Id of the failing handler.
        handler: String,
        /// Description of the failure.
        message: String,
    },
}

/// A unit of behaviour attached to one or more event keys.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Key under which this handler's result is reported.
    fn id(&self) -> &str;

    /// Handles one delivery.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Fatal`] stops the dispatch; later handlers do not run.
    async fn handle(&self, ctx: &RequestContext<'_>) -> Result<Value, HandlerError>;
}

/// Whether any handler matched the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchStatus {
    /// At least one handler ran.
    Hit,
    /// No handler is registered for the event or its action.
    Miss,
}

/// The response body of a dispatched delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    /// `HIT` or `MISS`.
    pub status: DispatchStatus,
    /// Result of each handler that ran, keyed by handler id.
    pub calls: BTreeMap<String, Value>,
}

/// Maps event keys to ordered handler lists.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn WebhookHandler>>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("HandlerRegistry").field("keys", &keys).finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `handler` to `key` (`event` or `event.action`).
    pub fn register(&mut self, key: impl Into<String>, handler: Arc<dyn WebhookHandler>) {
        let key = key.into();
        debug!(key = %key, handler = handler.id(), "Registered webhook handler");
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Number of handlers attached to `key`.
    pub fn len_for(&self, key: &str) -> usize {
        self.handlers.get(key).map_or(0, Vec::len)
    }

    /// Handlers that apply to a delivery, bare-event handlers first.
    pub fn handlers_for(&self, event: &WebhookEvent) -> Vec<Arc<dyn WebhookHandler>> {
        let mut matched: Vec<Arc<dyn WebhookHandler>> = Vec::new();
        if let Some(handlers) = self.handlers.get(&event.event) {
            matched.extend(handlers.iter().cloned());
        }
        if event.action.is_some() {
            if let Some(handlers) = self.handlers.get(&event.qualified_name()) {
                matched.extend(handlers.iter().cloned());
            }
        }
        matched
    }

    /// Runs every matching handler in order and collects their results.
    ///
    /// # Errors
    ///
    /// The first [`HandlerError`]; remaining handlers are skipped.
    pub async fn dispatch(&self, ctx: &RequestContext<'_>) -> Result<DispatchReport, HandlerError> {
        let handlers = self.handlers_for(ctx.event);
        if handlers.is_empty() {
            debug!(event = %ctx.event.qualified_name(), "No handler registered for event");
            return Ok(DispatchReport {
                status: DispatchStatus::Miss,
                calls: BTreeMap::new(),
            });
        }

        let mut calls = BTreeMap::new();
        for handler in handlers {
            debug!(handler = handler.id(), "Running webhook handler");
            match handler.handle(ctx).await {
                Ok(value) => {
                    calls.insert(handler.id().to_string(), value);
                }
                Err(e) => {
                    error!(handler = handler.id(), error = %e, "Webhook handler aborted dispatch");
                    return Err(e);
                }
            }
        }

        Ok(DispatchReport {
            status: DispatchStatus::Hit,
            calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderMap;
    use policy::testing::RecordingGateway;
    use policy::DeliveryId;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    struct Recorder {
        id: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fatal: bool,
    }

    #[async_trait]
    impl WebhookHandler for Recorder {
        fn id(&self) -> &str {
            self.id
        }

        async fn handle(&self, _ctx: &RequestContext<'_>) -> Result<Value, HandlerError> {
            self.log.lock().unwrap().push(self.id);
            if self.fatal {
                return Err(HandlerError::Fatal {
                    handler: self.id.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(json!(format!("{} ran", self.id)))
        }
    }

    fn recorder(id: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn WebhookHandler> {
        Arc::new(Recorder {
            id,
            log: Arc::clone(log),
            fatal: false,
        })
    }

    fn event(name: &str, action: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            delivery: DeliveryId::new_random(),
            event: name.to_string(),
            action: action.map(str::to_string),
            payload: json!({}),
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn test_event_handlers_run_before_action_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register("code_scanning_alert.created", recorder("on_created", &log));
        registry.register("code_scanning_alert", recorder("on_any", &log));
        registry.register("code_scanning_alert.created", recorder("on_created_2", &log));

        let gateway = RecordingGateway::default();
        let event = event("code_scanning_alert", Some("created"));
        let report = registry
            .dispatch(&RequestContext {
                event: &event,
                gateway: &gateway,
            })
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["on_any", "on_created", "on_created_2"]);
        assert_eq!(report.status, DispatchStatus::Hit);
        assert_eq!(report.calls.len(), 3);
        assert_eq!(report.calls["on_created"], json!("on_created ran"));
    }

    #[tokio::test]
    async fn test_other_actions_do_not_match() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register("code_scanning_alert.created", recorder("on_created", &log));

        let gateway = RecordingGateway::default();
        let event = event("code_scanning_alert", Some("fixed"));
        let report = registry
            .dispatch(&RequestContext {
                event: &event,
                gateway: &gateway,
            })
            .await
            .unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(
            report,
            DispatchReport {
                status: DispatchStatus::Miss,
                calls: BTreeMap::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_fatal_error_stops_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(
            "ping",
            Arc::new(Recorder {
                id: "fails",
                log: Arc::clone(&log),
                fatal: true,
            }),
        );
        registry.register("ping", recorder("never", &log));

        let gateway = RecordingGateway::default();
        let event = event("ping", None);
        let result = registry
            .dispatch(&RequestContext {
                event: &event,
                gateway: &gateway,
            })
            .await;

        assert!(matches!(result, Err(HandlerError::Fatal { .. })));
        assert_eq!(*log.lock().unwrap(), vec!["fails"]);
    }

    #[test]
    fn test_report_serialises_status_in_upper_case() {
        let report = DispatchReport {
            status: DispatchStatus::Miss,
            calls: BTreeMap::new(),
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "MISS", "calls": {}})
        );
    }

    #[test]
    fn test_len_for_counts_registrations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register("a", recorder("x", &log));
        registry.register("a", recorder("y", &log));
        assert_eq!(registry.len_for("a"), 2);
        assert_eq!(registry.len_for("b"), 0);
    }
}

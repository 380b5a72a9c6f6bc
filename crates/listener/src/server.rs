//! HTTP surface: webhook route, health probe and the serve loop.
//!
//! Per delivery, in order:
//!
//! 1. validate content type, JSON body and event header (400 on failure);
//! 2. verify the signature (400 on failure);
//! 3. open a GitHub session for the payload's installation;
//! 4. dispatch to the registry and answer 200 with the report, or 500 when a
//!    handler hit a fatal error.
//!
//! The session lives on the stack of step 3 and is dropped before the
//! response is written.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use policy::GatewayFactory;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info, info_span, Instrument};

use crate::registry::{HandlerRegistry, RequestContext};
use crate::request::{validate_request, DELIVERY_HEADER};
use crate::verify::{verify_signature, WebhookSecret};

/// Default route for webhook deliveries.
pub const DEFAULT_WEBHOOK_PATH: &str = "/github";

/// Route of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// GitHub caps webhook payloads at 25 MB.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Everything the webhook route needs, shared across requests.
pub struct WebhookService {
    registry: HandlerRegistry,
    secret: WebhookSecret,
    gateways: Arc<dyn GatewayFactory>,
}

impl std::fmt::Debug for WebhookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookService")
            .field("registry", &self.registry)
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

impl WebhookService {
    pub fn new(
        registry: HandlerRegistry,
        secret: WebhookSecret,
        gateways: Arc<dyn GatewayFactory>,
    ) -> Self {
        Self {
            registry,
            secret,
            gateways,
        }
    }

    /// Processes one delivery end to end and builds the HTTP response.
    pub async fn handle(&self, headers: &HeaderMap, body: Bytes) -> (StatusCode, Value) {
        let event = match validate_request(headers, body) {
            Ok(event) => event,
            Err(e) => {
                let delivery = headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok());
                error!(delivery, error = %e, "Rejected invalid webhook request");
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        let span = info_span!(
            "webhook",
            delivery = %event.delivery,
            event = %event.event,
            action = event.action.as_deref().unwrap_or(""),
        );

        async {
            if let Err(e) = verify_signature(&self.secret, &event.body, &event.headers) {
                error!(error = %e, "Rejected webhook with invalid signature");
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }

            let gateway = self.gateways.open_session(event.installation_id());
            let ctx = RequestContext {
                event: &event,
                gateway: gateway.as_ref(),
            };

            match self.registry.dispatch(&ctx).await {
                Ok(report) => {
                    info!(status = ?report.status, handlers = report.calls.len(), "Webhook dispatched");
                    match serde_json::to_value(&report) {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
                    }
                }
                Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            }
        }
        .instrument(span)
        .await
    }
}

/// Builds the router: `POST {webhook_path}` and `GET /health`.
pub fn router(service: Arc<WebhookService>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(webhook))
        .route(HEALTH_PATH, get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(service)
}

/// Binds `addr` and serves `router` until `shutdown` resolves.
///
/// In-flight deliveries are allowed to finish before this returns.
///
/// # Errors
///
/// I/O errors from binding or accepting connections.
pub async fn serve<F>(addr: SocketAddr, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Webhook server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn webhook(
    State(service): State<Arc<WebhookService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (status, body) = service.handle(&headers, body).await;
    (status, Json(body)).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn error_response(status: StatusCode, description: &str) -> (StatusCode, Value) {
    (
        status,
        json!({ "status": "ERROR", "description": description }),
    )
}

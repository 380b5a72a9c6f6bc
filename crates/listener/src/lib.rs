//! GHAS reviewer webhook infrastructure.
//!
//! Receives GitHub webhook deliveries over HTTP, rejects anything that is not
//! a well-formed, correctly signed JSON delivery, and dispatches the rest to
//! the handlers registered for the event and its action. Handlers reach
//! GitHub only through the [`policy::AlertGateway`] session opened for their
//! delivery.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP, signature schemes and routing live here. Policy
//! decisions stay in the [`policy`] crate; REST calls stay in `github`.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`request`] | [`validate_request`] and the [`WebhookEvent`] it produces |
//! | [`verify`] | HMAC signature verification |
//! | [`registry`] | [`HandlerRegistry`], [`WebhookHandler`] and dispatch |
//! | [`handlers`] | Alert handlers and [`triage_registry`] |
//! | [`server`] | axum router and serve loop |

pub mod handlers;
pub mod registry;
pub mod request;
pub mod server;
pub mod verify;

pub use handlers::{triage_registry, AlertDismissedHandler, AlertOpenedHandler};
pub use registry::{
    DispatchReport, DispatchStatus, HandlerError, HandlerRegistry, RequestContext, WebhookHandler,
};
pub use request::{validate_request, ValidationError, WebhookEvent};
pub use server::{router, serve, WebhookService, DEFAULT_WEBHOOK_PATH, HEALTH_PATH};
pub use verify::{verify_signature, SignatureError, SignatureScheme, Verification, WebhookSecret};

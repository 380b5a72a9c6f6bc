//! GHAS reviewer GitHub infrastructure adapter.
//!
//! Implements the [`policy::AlertGateway`] and [`policy::GatewayFactory`] ports
//! over the GitHub REST API, authenticating as a GitHub App.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain policy rules.
//! Authentication (App JWT, installation token exchange), URL construction,
//! pagination and status-code interpretation are handled here; the [`policy`]
//! crate never sees them.
//!
//! ## Client lifecycle
//!
//! [`GitHubApp`] is created once at start-up and holds only the App id, the
//! parsed private key and a connection pool. Every webhook delivery gets its
//! own [`ClientSession`], which authenticates lazily:
//!
//! | Client | Credential | Used for |
//! |--------|------------|----------|
//! | app | RS256 JWT signed with the App key | `GET /app` (bot login) |
//! | installation | installation access token | everything else |
//!
//! Sessions are dropped with the delivery; no token is ever shared between
//! deliveries.

pub mod auth;
pub mod client;
pub mod rest;
pub mod session;

pub use auth::{AppCredentials, AuthError};
pub use client::{ApiClient, ApiResponse};
pub use session::{ClientSession, GitHubApp, GitHubAppSettings, DEFAULT_API_URL};

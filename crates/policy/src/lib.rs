//! Review policy domain for the GHAS reviewer App.
//!
//! This crate contains every domain concept the reviewer reasons about: typed
//! identifiers, the normalized view of GHAS alert payloads, the review policy,
//! the port traits through which GitHub is reached, and the triage engine that
//! decides which of those ports to call. Infrastructure crates implement the
//! traits defined here; they never add policy rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* GitHub must do for the policy to hold; the `github` crate
//! defines *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`AlertNumber`, `TeamSlug`, etc.) |
//! | [`alert`] | [`AlertRecord`]: one surface over the three alert payload shapes |
//! | [`config`] | [`PolicyConfig`]: allow-lists, teams and feature switches |
//! | [`gateway`] | [`AlertGateway`] / [`GatewayFactory`] port traits |
//! | [`triage`] | [`TriageEngine`]: the opened and dismissed flows |
//! | [`errors`] | Gateway, ref and policy error types |

pub mod alert;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod identifiers;
pub mod triage;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use alert::{AlertKind, AlertRecord};
pub use config::{FeatureToggles, PolicyConfig, TeamRoute};
pub use errors::{GatewayError, PolicyError, RefError};
#[cfg(any(test, feature = "test-support"))]
pub use gateway::testing;
pub use gateway::{
    AlertGateway, GatewayFactory, IssueComment, RequestedTeam, TeamCreation, TEAM_DESCRIPTION,
};
pub use identifiers::{
    AlertNumber, AppId, DeliveryId, InstallationId, OwnerLogin, PullRequestNumber,
    RepositoryName, RepositoryRef, TeamSlug, UserLogin,
};
pub use triage::{review_comment, GateMiss, ReopenReason, TriageEngine, TriageOutcome};

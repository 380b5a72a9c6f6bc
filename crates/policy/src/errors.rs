//! Error types for the review policy domain.
//!
//! [`GatewayError`] covers every way a GitHub REST call made on behalf of the
//! policy engine can fail. [`RefError`] covers code-scanning refs that do not
//! name a pull request.
//!
//! Neither error is retried inside the process. GitHub's webhook redelivery is
//! the only retry mechanism, so errors are reported (logs and response body) and
//! the alert is left in whatever state the last successful call produced.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

/// Failure of one GitHub REST operation issued by the policy engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// GitHub answered with a non-success status code.
    ///
    /// For mutating calls this is usually a permissions problem with the App
    /// installation (missing `security_events`, `members` or `pull_requests`
    /// write access).
    #[error("{operation} failed with HTTP {status}: {body}")]
    Status {
        /// Short name of the operation (e.g. `"reopen alert"`).
        operation: String,
        /// HTTP status code returned by GitHub.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("{operation} could not reach GitHub: {message}")]
    Transport {
        /// Short name of the operation.
        operation: String,
        /// Transport-level error description.
        message: String,
    },

    /// The response arrived but its body did not have the expected shape.
    #[error("{operation} returned an unexpected body: {message}")]
    Decode {
        /// Short name of the operation.
        operation: String,
        /// Deserialisation error description.
        message: String,
    },

    /// An app or installation client could not be authenticated.
    ///
    /// This is a hard fault for the request being processed: the dispatcher
    /// stops and answers with a server error.
    #[error("GitHub authentication failed: {message}")]
    Authentication {
        /// Description of the authentication failure.
        message: String,
    },

    /// An installation client was needed but the payload has no `installation.id`.
    #[error("webhook payload has no installation id")]
    MissingInstallation,
}

impl GatewayError {
    /// Returns `true` if this error must abort the whole request rather than
    /// being reported as one handler's failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Authentication { .. } | GatewayError::MissingInstallation
        )
    }

    /// Returns the HTTP status GitHub answered with, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ref parsing errors
// ---------------------------------------------------------------------------

/// A code-scanning ref that cannot be turned into a pull request number.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefError {
    /// The ref does not start with `refs/pull/`.
    #[error("ref '{0}' does not point at a pull request")]
    NotPullRequest(String),

    /// The ref is a pull request ref but its number segment is not an integer.
    #[error("ref '{0}' has no numeric pull request segment")]
    InvalidNumber(String),
}

// ---------------------------------------------------------------------------
// Policy errors
// ---------------------------------------------------------------------------

/// The review policy itself is unusable.
///
/// Produced at load time; the service never starts with an invalid policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A policy value violates an invariant.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl PolicyError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        PolicyError::Configuration {
            message: message.into(),
        }
    }
}

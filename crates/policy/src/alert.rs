//! Alert adapter: one read-only view over the three GHAS alert payload shapes.
//!
//! Code-scanning, secret-scanning and Dependabot webhooks each nest their data
//! differently (who dismissed the alert, where the severity lives, whether a
//! tool or git ref exists at all). [`AlertRecord::from_payload`] projects any of
//! them onto the same surface so the policy engine never navigates raw JSON.
//!
//! The projection is total: a missing or mistyped field yields the zero value
//! (`""`, `0`) instead of an error. Absent data therefore fails closed in the
//! engine's gates (an empty tool never matches a non-empty allow-list, an empty
//! acting user is never a team member).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AlertNumber, InstallationId, OwnerLogin, PullRequestNumber, RefError, RepositoryName,
    RepositoryRef, UserLogin,
};

// ---------------------------------------------------------------------------
// Alert kinds
// ---------------------------------------------------------------------------

/// The GHAS product that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    /// Static analysis findings (CodeQL and third-party SARIF uploads).
    CodeScanning,
    /// Leaked credentials detected in repository content.
    SecretScanning,
    /// Vulnerable dependencies.
    Dependabot,
}

impl AlertKind {
    /// All kinds, in a stable order.
    pub const ALL: [AlertKind; 3] = [
        AlertKind::CodeScanning,
        AlertKind::SecretScanning,
        AlertKind::Dependabot,
    ];

    /// Maps an `X-GitHub-Event` value to the alert kind it carries.
    pub fn from_event(event: &str) -> Option<Self> {
        match event {
            "code_scanning_alert" => Some(AlertKind::CodeScanning),
            "secret_scanning_alert" => Some(AlertKind::SecretScanning),
            "dependabot_alert" => Some(AlertKind::Dependabot),
            _ => None,
        }
    }

    /// The `X-GitHub-Event` name GitHub uses for this kind.
    pub fn event_name(self) -> &'static str {
        match self {
            AlertKind::CodeScanning => "code_scanning_alert",
            AlertKind::SecretScanning => "secret_scanning_alert",
            AlertKind::Dependabot => "dependabot_alert",
        }
    }

    /// The path segment of this kind's REST alert endpoints
    /// (`/repos/{owner}/{repo}/{segment}/alerts/{number}`).
    pub fn api_segment(self) -> &'static str {
        match self {
            AlertKind::CodeScanning => "code-scanning",
            AlertKind::SecretScanning => "secret-scanning",
            AlertKind::Dependabot => "dependabot",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_segment())
    }
}

// ---------------------------------------------------------------------------
// Alert record
// ---------------------------------------------------------------------------

/// A normalized, immutable view of one alert webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRecord {
    kind: AlertKind,
    number: u64,
    owner: String,
    repository: String,
    tool: String,
    severity: String,
    state: String,
    git_ref: String,
    acting_user: String,
    dismissed_comment: String,
    installation_id: u64,
}

impl AlertRecord {
    /// Projects a webhook payload of the given kind onto an [`AlertRecord`].
    ///
    /// Never fails; see the module documentation for the zero-value rules.
    pub fn from_payload(kind: AlertKind, payload: &Value) -> Self {
        let common = Self {
            kind,
            number: number_at(payload, "/alert/number"),
            owner: text_at(payload, "/repository/owner/login"),
            repository: text_at(payload, "/repository/name"),
            tool: String::new(),
            severity: String::new(),
            state: text_at(payload, "/alert/state"),
            git_ref: String::new(),
            acting_user: String::new(),
            dismissed_comment: String::new(),
            installation_id: number_at(payload, "/installation/id"),
        };

        match kind {
            AlertKind::CodeScanning => Self::code_scanning(common, payload),
            AlertKind::SecretScanning => Self::secret_scanning(common, payload),
            AlertKind::Dependabot => Self::dependabot(common, payload),
        }
    }

    fn code_scanning(common: Self, payload: &Value) -> Self {
        // Non-security queries carry no security level; fall back to the
        // rule's own severity (note/warning/error).
        let mut severity = text_at(payload, "/alert/rule/security_severity_level");
        if severity.is_empty() {
            severity = text_at(payload, "/alert/rule/severity");
        }

        let mut git_ref = text_at(payload, "/alert/most_recent_instance/ref");
        if git_ref.is_empty() {
            git_ref = text_at(payload, "/ref");
        }

        Self {
            tool: text_at(payload, "/alert/tool/name"),
            severity,
            git_ref,
            acting_user: text_at(payload, "/alert/dismissed_by/login"),
            dismissed_comment: text_at(payload, "/alert/dismissed_comment"),
            ..common
        }
    }

    fn secret_scanning(common: Self, payload: &Value) -> Self {
        Self {
            acting_user: text_at(payload, "/alert/resolved_by/login"),
            dismissed_comment: text_at(payload, "/alert/resolution_comment"),
            ..common
        }
    }

    fn dependabot(common: Self, payload: &Value) -> Self {
        Self {
            severity: text_at(payload, "/alert/security_advisory/severity"),
            acting_user: text_at(payload, "/alert/dismissed_by/login"),
            dismissed_comment: text_at(payload, "/alert/dismissed_comment"),
            ..common
        }
    }

    // -----------------------------------------------------------------------
    // Raw accessors (zero values when absent)
    // -----------------------------------------------------------------------

    /// The product that raised the alert.
    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    /// Alert number within its repository.
    pub fn number(&self) -> AlertNumber {
        AlertNumber::new(self.number)
    }

    /// Repository owner login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Analysis tool name. Always empty for secret-scanning and Dependabot.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Severity string as delivered by GitHub (e.g. `"high"`, `"error"`).
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// Alert state (`"open"`, `"dismissed"`, `"resolved"`, `"fixed"`, ...).
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Git ref of the most recent instance. Always empty outside code scanning.
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    /// Login of the user who dismissed or resolved the alert.
    pub fn acting_user(&self) -> &str {
        &self.acting_user
    }

    /// Free-text justification given when the alert was closed.
    pub fn dismissed_comment(&self) -> &str {
        &self.dismissed_comment
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    /// The installation the delivery belongs to, if the payload names one.
    pub fn installation_id(&self) -> Option<InstallationId> {
        (self.installation_id != 0).then(|| InstallationId::new(self.installation_id))
    }

    /// The owning repository, or `None` if either half is missing.
    pub fn repository_ref(&self) -> Option<RepositoryRef> {
        Some(RepositoryRef::new(
            OwnerLogin::new(self.owner.as_str())?,
            RepositoryName::new(self.repository.as_str())?,
        ))
    }

    /// The acting user as a login, or `None` if the payload names nobody
    /// (e.g. automatic Dependabot dismissals).
    pub fn acting_login(&self) -> Option<UserLogin> {
        UserLogin::new(self.acting_user.as_str())
    }

    /// Returns `true` if a non-blank dismissal justification was provided.
    pub fn has_dismissal_comment(&self) -> bool {
        !self.dismissed_comment.trim().is_empty()
    }

    // -----------------------------------------------------------------------
    // Pull request refs (code scanning only)
    // -----------------------------------------------------------------------

    /// Returns `true` if the alert's ref has the shape `refs/pull/<n>/<suffix>`.
    ///
    /// Only the first two path segments are inspected; use
    /// [`Self::pull_request_number`] to validate the number itself.
    pub fn is_pull_request(&self) -> bool {
        let mut segments = self.git_ref.split('/');
        segments.next() == Some("refs") && segments.next() == Some("pull")
    }

    /// Extracts `<n>` from a `refs/pull/<n>/<suffix>` ref.
    ///
    /// # Errors
    ///
    /// [`RefError::NotPullRequest`] if [`Self::is_pull_request`] is `false`;
    /// [`RefError::InvalidNumber`] if the number segment is missing or not an
    /// unsigned integer.
    pub fn pull_request_number(&self) -> Result<PullRequestNumber, RefError> {
        if !self.is_pull_request() {
            return Err(RefError::NotPullRequest(self.git_ref.clone()));
        }
        self.git_ref
            .split('/')
            .nth(2)
            .and_then(|segment| segment.parse::<u64>().ok())
            .map(PullRequestNumber::new)
            .ok_or_else(|| RefError::InvalidNumber(self.git_ref.clone()))
    }
}

// ---------------------------------------------------------------------------
// Soft JSON navigation
// ---------------------------------------------------------------------------

fn text_at(payload: &Value, pointer: &str) -> String {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number_at(payload: &Value, pointer: &str) -> u64 {
    payload
        .pointer(pointer)
        .and_then(Value::as_u64)
        .unwrap_or_default()
}

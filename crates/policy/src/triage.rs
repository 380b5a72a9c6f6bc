//! The triage policy engine.
//!
//! Two flows, each a chain of gates followed by the smallest set of GitHub calls
//! that brings the alert in line with the policy:
//!
//! - **Alert opened** (code scanning `created` / `appeared_in_branch` /
//!   `reopened`): if the alert sits on a pull request and passes the tool and
//!   severity gates, comment once on the pull request and request the reviewer
//!   team once. The two steps are checked independently, so a redelivery
//!   repairs a reviewer request that failed after the comment went out.
//! - **Alert dismissed** (any kind's `closed_by_user` / `dismissed` /
//!   `resolved`): make sure the reviewer team exists, then accept the dismissal
//!   if the acting user belongs to that team and reopen the alert otherwise.
//!
//! Gate misses are normal outcomes, not errors. The engine is stateless: every
//! "did we already do this?" question is answered by asking GitHub, so
//! redelivering the same webhook never duplicates a comment or a reviewer
//! request.
//!
//! ```text
//! OPEN ──dismissed by actor──▶ DISMISSED ──actor in team──▶ ACCEPTED
//!                                  └────actor not in team──▶ REOPENED (OPEN)
//! OPEN × in PR × gates pass ──▶ COMMENTED + REVIEWER_REQUESTED
//! ```

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    AlertGateway, AlertKind, AlertRecord, GatewayError, OwnerLogin, PolicyConfig,
    PullRequestNumber, RepositoryRef, TeamCreation, TeamSlug, UserLogin, TEAM_DESCRIPTION,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a flow stopped before taking any action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum GateMiss {
    /// Handling of this alert kind is switched off.
    FeatureDisabled { kind: AlertKind },
    /// The payload does not name the owning repository.
    MissingRepository,
    /// The code-scanning alert is not on a pull request ref.
    NotPullRequest { git_ref: String },
    /// The tool is not in the allow-list.
    ToolNotAllowed { tool: String },
    /// The severity is not in the allow-list.
    SeverityNotAllowed { severity: String },
}

impl std::fmt::Display for GateMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateMiss::FeatureDisabled { kind } => write!(f, "{kind} handling is disabled"),
            GateMiss::MissingRepository => write!(f, "payload names no repository"),
            GateMiss::NotPullRequest { git_ref } => {
                write!(f, "alert is not on a pull request (ref '{git_ref}')")
            }
            GateMiss::ToolNotAllowed { tool } => {
                write!(f, "tool '{tool}' is not in the list of approved tools")
            }
            GateMiss::SeverityNotAllowed { severity } => {
                write!(f, "severity '{severity}' does not require security review")
            }
        }
    }
}

/// Why an alert was forced back open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenReason {
    /// The dismissal carried no justification comment.
    MissingDismissalComment,
    /// The acting user is not a member of the reviewer team.
    NotTeamMember,
    /// The payload does not say who closed the alert.
    UnknownActor,
}

/// What the engine did for one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriageOutcome {
    /// A gate failed; nothing was changed.
    Skipped { reason: GateMiss },
    /// The pull request carries the bot's comment and the team is a
    /// requested reviewer.
    Notified {
        pull_request: PullRequestNumber,
        team: TeamSlug,
        /// `false` if the bot had already commented in an earlier delivery.
        commented: bool,
        /// `false` if the team was already a requested reviewer.
        reviewer_requested: bool,
    },
    /// The acting user is a member of the reviewer team; the dismissal stands.
    Authorized { user: UserLogin, team: TeamSlug },
    /// The alert was moved back to `open`.
    Reopened {
        reason: ReopenReason,
        user: Option<UserLogin>,
    },
}

impl std::fmt::Display for TriageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriageOutcome::Skipped { reason } => write!(f, "Skipped: {reason}"),
            TriageOutcome::Notified {
                pull_request,
                team,
                commented,
                reviewer_requested,
            } => match (commented, reviewer_requested) {
                (true, true) => write!(
                    f,
                    "Commented on pull request #{pull_request} and requested review from '{team}'"
                ),
                (true, false) => write!(
                    f,
                    "Commented on pull request #{pull_request}; '{team}' was already a reviewer"
                ),
                (false, true) => write!(
                    f,
                    "Pull request #{pull_request} was already commented on; requested review from '{team}'"
                ),
                (false, false) => write!(f, "Pull request #{pull_request} was already notified"),
            },
            TriageOutcome::Authorized { user, team } => {
                write!(f, "User '{user}' is authorized by team '{team}'")
            }
            TriageOutcome::Reopened { reason, user } => {
                let user = user.as_ref().map(UserLogin::as_str).unwrap_or("<unknown>");
                match reason {
                    ReopenReason::MissingDismissalComment => {
                        write!(f, "Reopened alert dismissed by '{user}' without a comment")
                    }
                    ReopenReason::NotTeamMember => write!(
                        f,
                        "Reopened alert: '{user}' is not allowed to close security alerts"
                    ),
                    ReopenReason::UnknownActor => {
                        write!(f, "Reopened alert closed by an unknown user")
                    }
                }
            }
        }
    }
}

impl From<GateMiss> for TriageOutcome {
    fn from(reason: GateMiss) -> Self {
        TriageOutcome::Skipped { reason }
    }
}

/// Renders the comment posted on pull requests that introduce alerts.
pub fn review_comment(tool: &str, org: &OwnerLogin, team: &TeamSlug) -> String {
    format!(r#"Security Alerts discovered by "{tool}". Informing @{org}/{team} team members."#)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies a [`PolicyConfig`] to alerts through one request's [`AlertGateway`].
pub struct TriageEngine<'a> {
    policy: &'a PolicyConfig,
    gateway: &'a dyn AlertGateway,
}

impl<'a> TriageEngine<'a> {
    /// Binds the engine to the policy and to the current delivery's gateway.
    pub fn new(policy: &'a PolicyConfig, gateway: &'a dyn AlertGateway) -> Self {
        Self { policy, gateway }
    }

    /// Alert-opened flow.
    ///
    /// # Errors
    ///
    /// Returns the first [`GatewayError`]; calls already made are not undone.
    pub async fn on_alert_opened(&self, alert: &AlertRecord) -> Result<TriageOutcome, GatewayError> {
        if !self.policy.is_enabled(alert.kind()) {
            return Ok(self.skip(alert, GateMiss::FeatureDisabled { kind: alert.kind() }));
        }

        if !alert.is_pull_request() {
            return Ok(self.skip(
                alert,
                GateMiss::NotPullRequest {
                    git_ref: alert.git_ref().to_string(),
                },
            ));
        }
        let pull_request = match alert.pull_request_number() {
            Ok(number) => number,
            Err(error) => {
                warn!(alert = %alert.number(), %error, "Pull request ref cannot be parsed");
                return Ok(TriageOutcome::from(GateMiss::NotPullRequest {
                    git_ref: alert.git_ref().to_string(),
                }));
            }
        };

        if let Some(miss) = self.tool_gate(alert).or_else(|| self.severity_gate(alert)) {
            return Ok(self.skip(alert, miss));
        }
        let Some(repository) = alert.repository_ref() else {
            return Ok(self.skip(alert, GateMiss::MissingRepository));
        };

        debug!(alert = %alert.number(), %repository, %pull_request, "Alert opened on pull request");

        let team = self.policy.team_for(&repository).clone();

        let bot = self.gateway.bot_login().await?;
        let comments = self
            .gateway
            .list_pull_request_comments(&repository, pull_request)
            .await?;
        let already_commented = comments.iter().any(|c| c.author == bot.as_str());

        if already_commented {
            debug!(%repository, %pull_request, bot = %bot, "Bot already commented; skipping comment");
        } else {
            let body = review_comment(alert.tool(), &repository.owner, &team);
            self.gateway
                .post_pull_request_comment(&repository, pull_request, &body)
                .await?;
            info!(%repository, %pull_request, "Posted security review comment");
        }

        let requested = self
            .gateway
            .requested_team_reviewers(&repository, pull_request)
            .await?;
        let already_requested = requested
            .iter()
            .any(|t| t.slug.eq_ignore_ascii_case(team.as_str()));

        if already_requested {
            debug!(%repository, %pull_request, %team, "Team is already a reviewer; skipping");
        } else {
            self.gateway
                .request_team_reviewer(&repository, pull_request, &team)
                .await?;
            info!(%repository, %pull_request, %team, "Requested review from security team");
        }

        Ok(TriageOutcome::Notified {
            pull_request,
            team,
            commented: !already_commented,
            reviewer_requested: !already_requested,
        })
    }

    /// Alert-dismissed flow.
    ///
    /// # Errors
    ///
    /// Returns the first [`GatewayError`]; calls already made (e.g. a team
    /// creation) are not undone.
    pub async fn on_alert_dismissed(
        &self,
        alert: &AlertRecord,
    ) -> Result<TriageOutcome, GatewayError> {
        let kind = alert.kind();
        if !self.policy.is_enabled(kind) {
            return Ok(self.skip(alert, GateMiss::FeatureDisabled { kind }));
        }
        let Some(repository) = alert.repository_ref() else {
            return Ok(self.skip(alert, GateMiss::MissingRepository));
        };
        let actor = alert.acting_login();

        debug!(alert = %alert.number(), %kind, %repository, actor = alert.acting_user(), "Alert closed");

        if kind == AlertKind::CodeScanning
            && self.policy.require_dismissal_comment
            && !alert.has_dismissal_comment()
        {
            info!(alert = %alert.number(), %repository, "Dismissal has no comment; reopening");
            self.reopen(&repository, alert).await?;
            return Ok(TriageOutcome::Reopened {
                reason: ReopenReason::MissingDismissalComment,
                user: actor,
            });
        }

        if kind == AlertKind::CodeScanning {
            if let Some(miss) = self.tool_gate(alert) {
                return Ok(self.skip(alert, miss));
            }
        }
        let severity_gated = match kind {
            AlertKind::CodeScanning => true,
            AlertKind::Dependabot => self.policy.gate_dependabot_severity,
            AlertKind::SecretScanning => false,
        };
        if severity_gated {
            if let Some(miss) = self.severity_gate(alert) {
                return Ok(self.skip(alert, miss));
            }
        }

        let team = self.policy.team_for(&repository).clone();
        self.ensure_team(&repository.owner, &team).await?;

        let Some(user) = actor else {
            warn!(alert = %alert.number(), %repository, "Payload names no acting user; reopening");
            self.reopen(&repository, alert).await?;
            return Ok(TriageOutcome::Reopened {
                reason: ReopenReason::UnknownActor,
                user: None,
            });
        };

        if self
            .gateway
            .is_team_member(&repository.owner, &team, &user)
            .await?
        {
            debug!(%user, %team, "User is part of the security team; no action taken");
            return Ok(TriageOutcome::Authorized { user, team });
        }

        info!(%user, %team, alert = %alert.number(), "User may not close security alerts; reopening");
        self.reopen(&repository, alert).await?;
        Ok(TriageOutcome::Reopened {
            reason: ReopenReason::NotTeamMember,
            user: Some(user),
        })
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn tool_gate(&self, alert: &AlertRecord) -> Option<GateMiss> {
        (!self.policy.accepts_tool(alert.tool())).then(|| GateMiss::ToolNotAllowed {
            tool: alert.tool().to_string(),
        })
    }

    fn severity_gate(&self, alert: &AlertRecord) -> Option<GateMiss> {
        (!self.policy.accepts_severity(alert.severity())).then(|| GateMiss::SeverityNotAllowed {
            severity: alert.severity().to_string(),
        })
    }

    fn skip(&self, alert: &AlertRecord, reason: GateMiss) -> TriageOutcome {
        debug!(alert = %alert.number(), kind = %alert.kind(), %reason, "Gate not passed; ignoring alert");
        TriageOutcome::from(reason)
    }

    async fn ensure_team(&self, org: &OwnerLogin, team: &TeamSlug) -> Result<(), GatewayError> {
        if self.gateway.team_exists(org, team).await? {
            return Ok(());
        }
        debug!(%org, %team, "Team does not exist; creating it");
        match self.gateway.create_team(org, team, TEAM_DESCRIPTION).await? {
            TeamCreation::Created => info!(%org, %team, "Created security reviewer team"),
            TeamCreation::AlreadyExists => debug!(%org, %team, "Team already exists"),
        }
        Ok(())
    }

    async fn reopen(
        &self,
        repository: &RepositoryRef,
        alert: &AlertRecord,
    ) -> Result<(), GatewayError> {
        self.gateway
            .reopen_alert(repository, alert.kind(), alert.number())
            .await
            .map_err(|error| {
                warn!(
                    %repository,
                    alert = %alert.number(),
                    kind = %alert.kind(),
                    %error,
                    "Unable to re-open alert; check the App's security events permission"
                );
                error
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GatewayCall, RecordingGateway};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    const TEAM: &str = "ghas-reviewers";

    fn policy() -> PolicyConfig {
        PolicyConfig {
            tools: vec!["CodeQL".to_string()],
            severities: vec!["high".to_string(), "critical".to_string()],
            ..PolicyConfig::default()
        }
    }

    fn code_scanning(action: &str, git_ref: &str, severity: &str, dismissed_by: Value) -> AlertRecord {
        AlertRecord::from_payload(
            AlertKind::CodeScanning,
            &json!({
                "action": action,
                "alert": {
                    "number": 12,
                    "tool": { "name": "CodeQL" },
                    "rule": { "security_severity_level": severity },
                    "most_recent_instance": { "ref": git_ref },
                    "dismissed_by": dismissed_by,
                    "dismissed_comment": "",
                },
                "repository": { "name": "hello-world", "owner": { "login": "octo-org" } },
                "installation": { "id": 1 },
            }),
        )
    }

    fn opened(git_ref: &str) -> AlertRecord {
        code_scanning("created", git_ref, "high", Value::Null)
    }

    fn dismissed_by(user: &str) -> AlertRecord {
        code_scanning("closed_by_user", "refs/heads/main", "high", json!({ "login": user }))
    }

    fn is_reopen(call: &GatewayCall) -> bool {
        matches!(call, GatewayCall::Reopen { .. })
    }

    // -----------------------------------------------------------------------
    // Alert opened
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_opened_comments_and_requests_team() {
        let gateway = RecordingGateway::default();
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_opened(&opened("refs/pull/7/merge")).await.unwrap();

        assert_eq!(
            outcome,
            TriageOutcome::Notified {
                pull_request: PullRequestNumber::new(7),
                team: TeamSlug::new(TEAM).unwrap(),
                commented: true,
                reviewer_requested: true,
            }
        );
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::BotLogin,
                GatewayCall::ListComments { pull_request: 7 },
                GatewayCall::PostComment {
                    pull_request: 7,
                    body: r#"Security Alerts discovered by "CodeQL". Informing @octo-org/ghas-reviewers team members."#
                        .to_string(),
                },
                GatewayCall::RequestedReviewers { pull_request: 7 },
                GatewayCall::RequestTeam {
                    pull_request: 7,
                    team: TEAM.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_opened_is_idempotent_under_redelivery() {
        let gateway = RecordingGateway::default();
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);
        let alert = opened("refs/pull/7/merge");

        engine.on_alert_opened(&alert).await.unwrap();
        let second = engine.on_alert_opened(&alert).await.unwrap();

        assert_eq!(
            second,
            TriageOutcome::Notified {
                pull_request: PullRequestNumber::new(7),
                team: TeamSlug::new(TEAM).unwrap(),
                commented: false,
                reviewer_requested: false,
            }
        );
        assert_eq!(second.to_string(), "Pull request #7 was already notified");
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::PostComment { .. })), 1);
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::RequestTeam { .. })), 1);
    }

    #[tokio::test]
    async fn test_opened_requests_missing_team_when_bot_already_commented() {
        let gateway = RecordingGateway::default().with_comment(
            7,
            "ghas-reviewer[bot]",
            r#"Security Alerts discovered by "CodeQL". Informing @octo-org/ghas-reviewers team members."#,
        );
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_opened(&opened("refs/pull/7/merge")).await.unwrap();

        assert_eq!(
            outcome,
            TriageOutcome::Notified {
                pull_request: PullRequestNumber::new(7),
                team: TeamSlug::new(TEAM).unwrap(),
                commented: false,
                reviewer_requested: true,
            }
        );
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::PostComment { .. })), 0);
        assert_eq!(
            gateway
                .calls()
                .into_iter()
                .filter(|c| matches!(c, GatewayCall::RequestTeam { .. }))
                .collect::<Vec<_>>(),
            vec![GatewayCall::RequestTeam {
                pull_request: 7,
                team: TEAM.to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_opened_redelivery_repairs_failed_reviewer_request() {
        let failing = RecordingGateway::default().failing(
            "request_team",
            GatewayError::Status {
                operation: "request reviewer".to_string(),
                status: 502,
                body: "Bad Gateway".to_string(),
            },
        );
        let policy = policy();
        let alert = opened("refs/pull/7/merge");

        assert!(TriageEngine::new(&policy, &failing)
            .on_alert_opened(&alert)
            .await
            .is_err());

        // The comment landed; the redelivery sees it and only requests the team.
        let gateway = RecordingGateway::default().with_comment(7, "ghas-reviewer[bot]", "Security Alerts");
        let outcome = TriageEngine::new(&policy, &gateway)
            .on_alert_opened(&alert)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            TriageOutcome::Notified {
                commented: false,
                reviewer_requested: true,
                ..
            }
        ));
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::RequestTeam { .. })), 1);
    }

    #[tokio::test]
    async fn test_opened_ignores_comments_from_other_users() {
        let gateway = RecordingGateway::default().with_comment(7, "octocat", "LGTM");
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_opened(&opened("refs/pull/7/merge")).await.unwrap();
        assert!(matches!(outcome, TriageOutcome::Notified { .. }));
    }

    #[tokio::test]
    async fn test_opened_skips_reviewer_request_when_team_already_requested() {
        let gateway = RecordingGateway::default().with_requested_team(7, TEAM);
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_opened(&opened("refs/pull/7/merge")).await.unwrap();

        assert!(matches!(
            outcome,
            TriageOutcome::Notified {
                reviewer_requested: false,
                ..
            }
        ));
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::PostComment { .. })), 1);
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::RequestTeam { .. })), 0);
    }

    #[tokio::test]
    async fn test_opened_outside_pull_request_is_noop() {
        let gateway = RecordingGateway::default();
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_opened(&opened("refs/heads/main")).await.unwrap();

        assert!(matches!(
            outcome,
            TriageOutcome::Skipped {
                reason: GateMiss::NotPullRequest { .. }
            }
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_opened_gates_tool_and_severity() {
        let gateway = RecordingGateway::default();
        let engine_policy = PolicyConfig {
            tools: vec!["Semgrep".to_string()],
            ..policy()
        };
        let engine = TriageEngine::new(&engine_policy, &gateway);
        let outcome = engine.on_alert_opened(&opened("refs/pull/7/merge")).await.unwrap();
        assert!(matches!(
            outcome,
            TriageOutcome::Skipped {
                reason: GateMiss::ToolNotAllowed { .. }
            }
        ));

        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);
        let low = code_scanning("created", "refs/pull/7/merge", "low", Value::Null);
        let outcome = engine.on_alert_opened(&low).await.unwrap();
        assert!(matches!(
            outcome,
            TriageOutcome::Skipped {
                reason: GateMiss::SeverityNotAllowed { .. }
            }
        ));

        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_opened_with_empty_allow_lists_accepts_any_alert() {
        let gateway = RecordingGateway::default();
        let policy = PolicyConfig::default();
        let engine = TriageEngine::new(&policy, &gateway);
        let alert = code_scanning("created", "refs/pull/3/head", "note", Value::Null);

        let outcome = engine.on_alert_opened(&alert).await.unwrap();
        assert!(matches!(outcome, TriageOutcome::Notified { .. }));
    }

    #[tokio::test]
    async fn test_opened_comment_failure_is_returned() {
        let gateway = RecordingGateway::default().failing(
            "post_comment",
            GatewayError::Status {
                operation: "post comment".to_string(),
                status: 403,
                body: "Resource not accessible by integration".to_string(),
            },
        );
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let error = engine
            .on_alert_opened(&opened("refs/pull/7/merge"))
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(403));
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::RequestTeam { .. })), 0);
    }

    // -----------------------------------------------------------------------
    // Alert dismissed
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_dismissed_by_team_member_is_accepted() {
        let gateway = RecordingGateway::default().with_member(TEAM, "security-lead");
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine
            .on_alert_dismissed(&dismissed_by("security-lead"))
            .await
            .unwrap();

        assert!(matches!(outcome, TriageOutcome::Authorized { .. }));
        assert_eq!(gateway.count(is_reopen), 0);
    }

    #[tokio::test]
    async fn test_dismissed_by_non_member_is_reopened_once() {
        let gateway = RecordingGateway::default().with_team(TEAM);
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine
            .on_alert_dismissed(&dismissed_by("developer"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            TriageOutcome::Reopened {
                reason: ReopenReason::NotTeamMember,
                user: UserLogin::new("developer"),
            }
        );
        assert_eq!(
            gateway.calls().into_iter().filter(is_reopen).collect::<Vec<_>>(),
            vec![GatewayCall::Reopen {
                kind: AlertKind::CodeScanning,
                number: 12
            }]
        );
    }

    #[tokio::test]
    async fn test_dismissed_creates_missing_team() {
        let gateway = RecordingGateway::default();
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        engine.on_alert_dismissed(&dismissed_by("developer")).await.unwrap();

        assert!(gateway.has_team(TEAM));
        assert!(gateway.calls().contains(&GatewayCall::CreateTeam {
            org: "octo-org".to_string(),
            team: TEAM.to_string(),
            description: "GitHub Advanced Security Reviewers".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_dismissed_reopen_failure_is_surfaced() {
        let gateway = RecordingGateway::default().with_team(TEAM).failing(
            "reopen",
            GatewayError::Status {
                operation: "reopen alert".to_string(),
                status: 403,
                body: "{}".to_string(),
            },
        );
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);

        let error = engine
            .on_alert_dismissed(&dismissed_by("developer"))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(403));
        // Not retried.
        assert_eq!(gateway.count(is_reopen), 1);
    }

    #[tokio::test]
    async fn test_dismissal_without_comment_reopens_before_other_gates() {
        let gateway = RecordingGateway::default().with_member(TEAM, "security-lead");
        let policy = PolicyConfig {
            require_dismissal_comment: true,
            tools: vec!["Semgrep".to_string()],
            ..policy()
        };
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine
            .on_alert_dismissed(&dismissed_by("security-lead"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            TriageOutcome::Reopened {
                reason: ReopenReason::MissingDismissalComment,
                ..
            }
        ));
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(gateway.count(is_reopen), 1);
    }

    #[tokio::test]
    async fn test_dismissed_tool_gate_skips_membership_check() {
        let gateway = RecordingGateway::default();
        let policy = PolicyConfig {
            tools: vec!["Semgrep".to_string()],
            ..policy()
        };
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine
            .on_alert_dismissed(&dismissed_by("developer"))
            .await
            .unwrap();

        assert!(matches!(outcome, TriageOutcome::Skipped { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_secret_scanning_resolution_skips_tool_and_severity_gates() {
        let gateway = RecordingGateway::default().with_team(TEAM);
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);
        let alert = AlertRecord::from_payload(
            AlertKind::SecretScanning,
            &json!({
                "action": "resolved",
                "alert": { "number": 4, "resolved_by": { "login": "developer" } },
                "repository": { "name": "hello-world", "owner": { "login": "octo-org" } },
            }),
        );

        engine.on_alert_dismissed(&alert).await.unwrap();

        assert!(gateway.calls().contains(&GatewayCall::Reopen {
            kind: AlertKind::SecretScanning,
            number: 4
        }));
    }

    #[tokio::test]
    async fn test_dependabot_severity_gate_is_opt_in() {
        let payload = json!({
            "action": "dismissed",
            "alert": {
                "number": 5,
                "dismissed_by": { "login": "developer" },
                "security_advisory": { "severity": "low" },
            },
            "repository": { "name": "hello-world", "owner": { "login": "octo-org" } },
        });
        let alert = AlertRecord::from_payload(AlertKind::Dependabot, &payload);

        let gateway = RecordingGateway::default().with_team(TEAM);
        let policy = policy();
        TriageEngine::new(&policy, &gateway)
            .on_alert_dismissed(&alert)
            .await
            .unwrap();
        assert_eq!(gateway.count(is_reopen), 1);

        let gateway = RecordingGateway::default().with_team(TEAM);
        let policy = PolicyConfig {
            gate_dependabot_severity: true,
            ..policy
        };
        let outcome = TriageEngine::new(&policy, &gateway)
            .on_alert_dismissed(&alert)
            .await
            .unwrap();
        assert!(matches!(outcome, TriageOutcome::Skipped { .. }));
        assert_eq!(gateway.count(is_reopen), 0);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_reopened() {
        let gateway = RecordingGateway::default().with_team(TEAM);
        let policy = policy();
        let engine = TriageEngine::new(&policy, &gateway);
        let alert = code_scanning("closed_by_user", "refs/heads/main", "high", Value::Null);

        let outcome = engine.on_alert_dismissed(&alert).await.unwrap();

        assert!(matches!(
            outcome,
            TriageOutcome::Reopened {
                reason: ReopenReason::UnknownActor,
                user: None
            }
        ));
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::IsMember { .. })), 0);
    }

    #[tokio::test]
    async fn test_disabled_feature_makes_no_calls() {
        let gateway = RecordingGateway::default();
        let mut policy = policy();
        policy.features.code_scanning = false;
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_dismissed(&dismissed_by("developer")).await.unwrap();

        assert_eq!(
            outcome,
            TriageOutcome::Skipped {
                reason: GateMiss::FeatureDisabled {
                    kind: AlertKind::CodeScanning
                }
            }
        );
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_routed_team_is_used_for_membership() {
        let gateway = RecordingGateway::default().with_member("octo-reviewers", "developer");
        let policy = PolicyConfig {
            teams: vec![crate::TeamRoute {
                name: TeamSlug::new("octo-reviewers").unwrap(),
                repositories: vec!["octo-org/hello-world".to_string()],
            }],
            ..policy()
        };
        let engine = TriageEngine::new(&policy, &gateway);

        let outcome = engine.on_alert_dismissed(&dismissed_by("developer")).await.unwrap();
        assert!(matches!(outcome, TriageOutcome::Authorized { .. }));
    }

    #[test]
    fn test_outcome_messages() {
        let outcome = TriageOutcome::Reopened {
            reason: ReopenReason::NotTeamMember,
            user: UserLogin::new("developer"),
        };
        assert_eq!(
            outcome.to_string(),
            "Reopened alert: 'developer' is not allowed to close security alerts"
        );
    }
}

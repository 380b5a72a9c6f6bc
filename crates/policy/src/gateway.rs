//! Port traits for the GitHub operations the policy engine needs.
//!
//! [`AlertGateway`] is the complete list of REST calls the triage engine may
//! issue. The `github` crate implements it over the real API; tests use
//! [`testing::RecordingGateway`] (behind the `test-support` feature).
//!
//! [`GatewayFactory`] hands out one gateway per webhook delivery. A gateway
//! holds request-scoped credentials and must be dropped when the delivery has
//! been handled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    AlertKind, AlertNumber, GatewayError, InstallationId, OwnerLogin, PullRequestNumber,
    RepositoryRef, TeamSlug, UserLogin,
};

/// Description given to reviewer teams the engine creates.
pub const TEAM_DESCRIPTION: &str = "GitHub Advanced Security Reviewers";

// ---------------------------------------------------------------------------
// Value types exchanged with the gateway
// ---------------------------------------------------------------------------

/// One comment on a pull request's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    /// Login of the comment author (empty for deleted accounts).
    pub author: String,
    /// Markdown body.
    pub body: String,
}

/// One team currently requested as reviewer on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedTeam {
    /// URL slug; compared against the configured team.
    pub slug: String,
    /// Display name.
    pub name: String,
}

/// Result of a team creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamCreation {
    /// The team was created by this call.
    Created,
    /// A team with that name already existed; treated as success.
    AlreadyExists,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// The GitHub operations available to the triage engine.
///
/// Every method maps to exactly one REST endpoint (plus pagination where
/// noted). No method retries; errors are returned as-is.
#[async_trait]
pub trait AlertGateway: Send + Sync {
    /// Resolves the App's own bot login (`GET /app`, `slug + "[bot]"`).
    async fn bot_login(&self) -> Result<UserLogin, GatewayError>;

    /// Lists every comment on a pull request conversation, following pagination
    /// (`GET /repos/{owner}/{repo}/issues/{pr}/comments`).
    async fn list_pull_request_comments(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
    ) -> Result<Vec<IssueComment>, GatewayError>;

    /// Posts a comment on a pull request conversation
    /// (`POST /repos/{owner}/{repo}/issues/{pr}/comments`).
    async fn post_pull_request_comment(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
        body: &str,
    ) -> Result<(), GatewayError>;

    /// Lists the teams currently requested as reviewers
    /// (`GET /repos/{owner}/{repo}/pulls/{pr}/requested_reviewers`).
    async fn requested_team_reviewers(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
    ) -> Result<Vec<RequestedTeam>, GatewayError>;

    /// Requests a team as reviewer
    /// (`POST /repos/{owner}/{repo}/pulls/{pr}/requested_reviewers`).
    async fn request_team_reviewer(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
        team: &TeamSlug,
    ) -> Result<(), GatewayError>;

    /// Returns `true` if the team exists in the organization
    /// (`GET /orgs/{org}/teams/{team}`; 404 means `false`).
    async fn team_exists(&self, org: &OwnerLogin, team: &TeamSlug) -> Result<bool, GatewayError>;

    /// Creates a team (`POST /orgs/{org}/teams`).
    ///
    /// A "name already exists" rejection is reported as
    /// [`TeamCreation::AlreadyExists`], not as an error.
    async fn create_team(
        &self,
        org: &OwnerLogin,
        team: &TeamSlug,
        description: &str,
    ) -> Result<TeamCreation, GatewayError>;

    /// Returns `true` if `user` is an active member of the team
    /// (`GET /orgs/{org}/teams/{team}/memberships/{user}`; 404 means `false`).
    async fn is_team_member(
        &self,
        org: &OwnerLogin,
        team: &TeamSlug,
        user: &UserLogin,
    ) -> Result<bool, GatewayError>;

    /// Moves an alert back to the `open` state
    /// (`PATCH /repos/{owner}/{repo}/{kind}/alerts/{number}`).
    async fn reopen_alert(
        &self,
        repository: &RepositoryRef,
        kind: AlertKind,
        number: AlertNumber,
    ) -> Result<(), GatewayError>;
}

/// Opens one request-scoped [`AlertGateway`] per webhook delivery.
///
/// Implementations must not cache gateways (or the credentials inside them)
/// across calls: installation tokens are short-lived and installation-specific.
pub trait GatewayFactory: Send + Sync {
    /// Opens a fresh gateway for the given installation.
    ///
    /// Opening is cheap and never authenticates; credentials are obtained on
    /// first use. A missing installation only fails once an installation-scoped
    /// call is attempted.
    fn open_session(&self, installation: Option<InstallationId>) -> Box<dyn AlertGateway>;
}

// ---------------------------------------------------------------------------
// In-memory gateway for tests
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! A recording, in-memory stand-in for GitHub.
    //!
    //! State (comments, requested reviewers, teams, memberships) persists across
    //! every session the [`RecordingFactory`] opens, the way GitHub's own state
    //! persists across webhook deliveries.

    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex, MutexGuard};

    use super::*;

    /// One call issued against the fake.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GatewayCall {
        BotLogin,
        ListComments { pull_request: u64 },
        PostComment { pull_request: u64, body: String },
        RequestedReviewers { pull_request: u64 },
        RequestTeam { pull_request: u64, team: String },
        TeamExists { org: String, team: String },
        CreateTeam { org: String, team: String, description: String },
        IsMember { team: String, user: String },
        Reopen { kind: AlertKind, number: u64 },
    }

    #[derive(Debug, Default)]
    struct State {
        bot: String,
        comments: BTreeMap<u64, Vec<IssueComment>>,
        requested: BTreeMap<u64, Vec<RequestedTeam>>,
        teams: BTreeSet<String>,
        members: BTreeSet<(String, String)>,
        calls: Vec<GatewayCall>,
        failures: BTreeMap<&'static str, GatewayError>,
        sessions: Vec<Option<InstallationId>>,
    }

    /// Shared-state fake implementing [`AlertGateway`].
    #[derive(Debug, Clone)]
    pub struct RecordingGateway {
        state: Arc<Mutex<State>>,
    }

    impl Default for RecordingGateway {
        fn default() -> Self {
            Self::new("ghas-reviewer[bot]")
        }
    }

    impl RecordingGateway {
        /// Creates an empty fake whose App resolves to `bot_login`.
        pub fn new(bot_login: &str) -> Self {
            Self {
                state: Arc::new(Mutex::new(State {
                    bot: bot_login.to_string(),
                    ..State::default()
                })),
            }
        }

        fn lock(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Seeds an existing team.
        pub fn with_team(self, team: &str) -> Self {
            self.lock().teams.insert(team.to_string());
            self
        }

        /// Seeds an existing team member (and the team).
        pub fn with_member(self, team: &str, user: &str) -> Self {
            {
                let mut state = self.lock();
                state.teams.insert(team.to_string());
                state.members.insert((team.to_string(), user.to_string()));
            }
            self
        }

        /// Seeds a comment on a pull request.
        pub fn with_comment(self, pull_request: u64, author: &str, body: &str) -> Self {
            self.lock()
                .comments
                .entry(pull_request)
                .or_default()
                .push(IssueComment {
                    author: author.to_string(),
                    body: body.to_string(),
                });
            self
        }

        /// Seeds a team already requested as reviewer.
        pub fn with_requested_team(self, pull_request: u64, slug: &str) -> Self {
            self.lock()
                .requested
                .entry(pull_request)
                .or_default()
                .push(RequestedTeam {
                    slug: slug.to_string(),
                    name: slug.to_string(),
                });
            self
        }

        /// Makes every call of the named operation fail with `error`.
        ///
        /// Operation names match the [`GatewayCall`] variants in snake case
        /// (`"post_comment"`, `"reopen"`, `"create_team"`, ...).
        pub fn failing(self, operation: &'static str, error: GatewayError) -> Self {
            self.lock().failures.insert(operation, error);
            self
        }

        /// Every call issued so far, in order.
        pub fn calls(&self) -> Vec<GatewayCall> {
            self.lock().calls.clone()
        }

        /// Number of calls matching `predicate`.
        pub fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
            self.lock().calls.iter().filter(|c| predicate(c)).count()
        }

        /// Installations of every session opened through a [`RecordingFactory`].
        pub fn sessions(&self) -> Vec<Option<InstallationId>> {
            self.lock().sessions.clone()
        }

        /// Returns `true` if the team exists in the fake.
        pub fn has_team(&self, team: &str) -> bool {
            self.lock().teams.contains(team)
        }

        fn record(&self, operation: &'static str, call: GatewayCall) -> Result<(), GatewayError> {
            let mut state = self.lock();
            state.calls.push(call);
            match state.failures.get(operation) {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl AlertGateway for RecordingGateway {
        async fn bot_login(&self) -> Result<UserLogin, GatewayError> {
            self.record("bot_login", GatewayCall::BotLogin)?;
            UserLogin::new(self.lock().bot.clone()).ok_or_else(|| GatewayError::Decode {
                operation: "get app".to_string(),
                message: "missing slug".to_string(),
            })
        }

        async fn list_pull_request_comments(
            &self,
            _repository: &RepositoryRef,
            pull_request: PullRequestNumber,
        ) -> Result<Vec<IssueComment>, GatewayError> {
            let pr = pull_request.as_u64();
            self.record("list_comments", GatewayCall::ListComments { pull_request: pr })?;
            Ok(self.lock().comments.get(&pr).cloned().unwrap_or_default())
        }

        async fn post_pull_request_comment(
            &self,
            _repository: &RepositoryRef,
            pull_request: PullRequestNumber,
            body: &str,
        ) -> Result<(), GatewayError> {
            let pr = pull_request.as_u64();
            self.record(
                "post_comment",
                GatewayCall::PostComment {
                    pull_request: pr,
                    body: body.to_string(),
                },
            )?;
            let mut state = self.lock();
            let author = state.bot.clone();
            state.comments.entry(pr).or_default().push(IssueComment {
                author,
                body: body.to_string(),
            });
            Ok(())
        }

        async fn requested_team_reviewers(
            &self,
            _repository: &RepositoryRef,
            pull_request: PullRequestNumber,
        ) -> Result<Vec<RequestedTeam>, GatewayError> {
            let pr = pull_request.as_u64();
            self.record(
                "requested_reviewers",
                GatewayCall::RequestedReviewers { pull_request: pr },
            )?;
            Ok(self.lock().requested.get(&pr).cloned().unwrap_or_default())
        }

        async fn request_team_reviewer(
            &self,
            _repository: &RepositoryRef,
            pull_request: PullRequestNumber,
            team: &TeamSlug,
        ) -> Result<(), GatewayError> {
            let pr = pull_request.as_u64();
            self.record(
                "request_team",
                GatewayCall::RequestTeam {
                    pull_request: pr,
                    team: team.to_string(),
                },
            )?;
            self.lock().requested.entry(pr).or_default().push(RequestedTeam {
                slug: team.to_string(),
                name: team.to_string(),
            });
            Ok(())
        }

        async fn team_exists(
            &self,
            org: &OwnerLogin,
            team: &TeamSlug,
        ) -> Result<bool, GatewayError> {
            self.record(
                "team_exists",
                GatewayCall::TeamExists {
                    org: org.to_string(),
                    team: team.to_string(),
                },
            )?;
            Ok(self.lock().teams.contains(team.as_str()))
        }

        async fn create_team(
            &self,
            org: &OwnerLogin,
            team: &TeamSlug,
            description: &str,
        ) -> Result<TeamCreation, GatewayError> {
            self.record(
                "create_team",
                GatewayCall::CreateTeam {
                    org: org.to_string(),
                    team: team.to_string(),
                    description: description.to_string(),
                },
            )?;
            if self.lock().teams.insert(team.to_string()) {
                Ok(TeamCreation::Created)
            } else {
                Ok(TeamCreation::AlreadyExists)
            }
        }

        async fn is_team_member(
            &self,
            _org: &OwnerLogin,
            team: &TeamSlug,
            user: &UserLogin,
        ) -> Result<bool, GatewayError> {
            self.record(
                "is_member",
                GatewayCall::IsMember {
                    team: team.to_string(),
                    user: user.to_string(),
                },
            )?;
            Ok(self
                .lock()
                .members
                .contains(&(team.to_string(), user.to_string())))
        }

        async fn reopen_alert(
            &self,
            _repository: &RepositoryRef,
            kind: AlertKind,
            number: AlertNumber,
        ) -> Result<(), GatewayError> {
            self.record(
                "reopen",
                GatewayCall::Reopen {
                    kind,
                    number: number.as_u64(),
                },
            )
        }
    }

    /// [`GatewayFactory`] whose sessions all share one [`RecordingGateway`].
    #[derive(Debug, Clone, Default)]
    pub struct RecordingFactory {
        gateway: RecordingGateway,
    }

    impl RecordingFactory {
        /// Wraps an existing fake.
        pub fn new(gateway: RecordingGateway) -> Self {
            Self { gateway }
        }

        /// The shared fake, for assertions.
        pub fn gateway(&self) -> &RecordingGateway {
            &self.gateway
        }
    }

    impl GatewayFactory for RecordingFactory {
        fn open_session(&self, installation: Option<InstallationId>) -> Box<dyn AlertGateway> {
            self.gateway.lock().sessions.push(installation);
            Box::new(self.gateway.clone())
        }
    }
}

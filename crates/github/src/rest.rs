//! [`AlertGateway`] over the GitHub REST API.
//!
//! Each operation uses the installation client, except [`AlertGateway::bot_login`]
//! which needs the app client. Status codes with a domain meaning (404 for
//! "no such team/member", 422 for "team already exists") are translated here;
//! every other non-2xx status becomes a [`GatewayError::Status`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use policy::{
    AlertGateway, AlertKind, AlertNumber, GatewayError, IssueComment, OwnerLogin,
    PullRequestNumber, RepositoryRef, RequestedTeam, TeamCreation, TeamSlug, UserLogin,
};

use crate::client::ApiResponse;
use crate::session::ClientSession;

/// Page size used when listing pull request comments.
const PER_PAGE: usize = 100;

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

fn alert_path(repository: &RepositoryRef, kind: AlertKind, number: AlertNumber) -> String {
    format!(
        "/repos/{}/{}/{}/alerts/{number}",
        repository.owner,
        repository.name,
        kind.api_segment()
    )
}

fn issue_comments_path(repository: &RepositoryRef, pull_request: PullRequestNumber) -> String {
    format!(
        "/repos/{}/{}/issues/{pull_request}/comments",
        repository.owner, repository.name
    )
}

fn requested_reviewers_path(repository: &RepositoryRef, pull_request: PullRequestNumber) -> String {
    format!(
        "/repos/{}/{}/pulls/{pull_request}/requested_reviewers",
        repository.owner, repository.name
    )
}

fn team_path(org: &OwnerLogin, team: &TeamSlug) -> String {
    format!("/orgs/{org}/teams/{team}")
}

fn membership_path(org: &OwnerLogin, team: &TeamSlug, user: &UserLogin) -> String {
    format!("/orgs/{org}/teams/{team}/memberships/{user}")
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct App {
    #[serde(default)]
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    user: Option<Account>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    login: String,
}

#[derive(Debug, Deserialize)]
struct RequestedReviewers {
    #[serde(default)]
    teams: Vec<RequestedTeam>,
}

#[derive(Debug, Deserialize)]
struct Membership {
    #[serde(default)]
    state: String,
}

// ---------------------------------------------------------------------------
// Status interpretation
// ---------------------------------------------------------------------------

/// 404 means "absent"; any other non-2xx is an error.
fn found(response: ApiResponse, operation: &str) -> Result<Option<ApiResponse>, GatewayError> {
    match response.status {
        404 => Ok(None),
        _ => response.success(operation).map(Some),
    }
}

fn team_creation(response: ApiResponse) -> Result<TeamCreation, GatewayError> {
    if response.is_success() {
        return Ok(TeamCreation::Created);
    }
    if response.status == 422 && response.body.contains("already exists") {
        return Ok(TeamCreation::AlreadyExists);
    }
    Err(response.into_error("create team"))
}

fn active_membership(response: ApiResponse) -> Result<bool, GatewayError> {
    match found(response, "check team membership")? {
        Some(response) => {
            let membership: Membership = response.json("check team membership")?;
            // Pending invitations do not grant review rights yet.
            Ok(membership.state == "active")
        }
        None => Ok(false),
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[async_trait]
impl AlertGateway for ClientSession {
    async fn bot_login(&self) -> Result<UserLogin, GatewayError> {
        const OP: &str = "get app";
        let app: App = self.app_client().await?.get(OP, "/app").await?.success(OP)?.json(OP)?;
        UserLogin::new(format!("{}[bot]", app.slug))
            .filter(|_| !app.slug.is_empty())
            .ok_or_else(|| GatewayError::Decode {
                operation: OP.to_string(),
                message: "app has no slug".to_string(),
            })
    }

    async fn list_pull_request_comments(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
    ) -> Result<Vec<IssueComment>, GatewayError> {
        const OP: &str = "list pull request comments";
        let client = self.installation_client().await?;
        let path = issue_comments_path(repository, pull_request);

        let mut comments = Vec::new();
        for page in 1.. {
            let batch: Vec<Comment> = client
                .get(OP, &format!("{path}?per_page={PER_PAGE}&page={page}"))
                .await?
                .success(OP)?
                .json(OP)?;
            let last_page = batch.len() < PER_PAGE;
            comments.extend(batch.into_iter().map(|c| IssueComment {
                author: c.user.map(|u| u.login).unwrap_or_default(),
                body: c.body.unwrap_or_default(),
            }));
            if last_page {
                break;
            }
        }
        debug!(%repository, %pull_request, count = comments.len(), "Listed pull request comments");
        Ok(comments)
    }

    async fn post_pull_request_comment(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
        body: &str,
    ) -> Result<(), GatewayError> {
        const OP: &str = "post pull request comment";
        self.installation_client()
            .await?
            .post(OP, &issue_comments_path(repository, pull_request), &json!({ "body": body }))
            .await?
            .success(OP)
            .map_err(|error| {
                warn!(%repository, %pull_request, %error, "Failed to write comment to pull request");
                error
            })?;
        Ok(())
    }

    async fn requested_team_reviewers(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
    ) -> Result<Vec<RequestedTeam>, GatewayError> {
        const OP: &str = "list requested reviewers";
        let reviewers: RequestedReviewers = self
            .installation_client()
            .await?
            .get(OP, &requested_reviewers_path(repository, pull_request))
            .await?
            .success(OP)?
            .json(OP)?;
        Ok(reviewers.teams)
    }

    async fn request_team_reviewer(
        &self,
        repository: &RepositoryRef,
        pull_request: PullRequestNumber,
        team: &TeamSlug,
    ) -> Result<(), GatewayError> {
        const OP: &str = "request team reviewer";
        self.installation_client()
            .await?
            .post(
                OP,
                &requested_reviewers_path(repository, pull_request),
                &json!({ "team_reviewers": [team.as_str()] }),
            )
            .await?
            .success(OP)
            .map_err(|error| {
                warn!(%repository, %pull_request, %team, %error, "Failed to add team to pull request");
                error
            })?;
        Ok(())
    }

    async fn team_exists(&self, org: &OwnerLogin, team: &TeamSlug) -> Result<bool, GatewayError> {
        const OP: &str = "get team";
        let response = self
            .installation_client()
            .await?
            .get(OP, &team_path(org, team))
            .await?;
        Ok(found(response, OP)?.is_some())
    }

    async fn create_team(
        &self,
        org: &OwnerLogin,
        team: &TeamSlug,
        description: &str,
    ) -> Result<TeamCreation, GatewayError> {
        let response = self
            .installation_client()
            .await?
            .post(
                "create team",
                &format!("/orgs/{org}/teams"),
                &json!({ "name": team.as_str(), "description": description }),
            )
            .await?;
        team_creation(response).map_err(|error| {
            warn!(%org, %team, %error, "Failed to create team");
            error
        })
    }

    async fn is_team_member(
        &self,
        org: &OwnerLogin,
        team: &TeamSlug,
        user: &UserLogin,
    ) -> Result<bool, GatewayError> {
        let response = self
            .installation_client()
            .await?
            .get("check team membership", &membership_path(org, team, user))
            .await?;
        active_membership(response)
    }

    async fn reopen_alert(
        &self,
        repository: &RepositoryRef,
        kind: AlertKind,
        number: AlertNumber,
    ) -> Result<(), GatewayError> {
        const OP: &str = "reopen alert";
        self.installation_client()
            .await?
            .patch(OP, &alert_path(repository, kind, number), &json!({ "state": "open" }))
            .await?
            .success(OP)?;
        Ok(())
    }
}

//! Process-wide review policy.
//!
//! A [`PolicyConfig`] is assembled once at start-up (flags, environment and an
//! optional policy file, see the `cli` crate) and shared read-only by every
//! webhook delivery afterwards.

use serde::{Deserialize, Serialize};

use crate::{AlertKind, PolicyError, RepositoryRef, TeamSlug};

/// The review policy the triage engine enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolicyConfig {
    /// Default reviewer team, used for every repository not routed elsewhere
    /// by [`Self::teams`].
    pub team: TeamSlug,

    /// Tool allow-list (code scanning only). Empty accepts every tool.
    pub tools: Vec<String>,

    /// Severity allow-list. Empty accepts every severity.
    pub severities: Vec<String>,

    /// Reopen code-scanning alerts dismissed without a justification comment,
    /// regardless of who dismissed them.
    pub require_dismissal_comment: bool,

    /// Apply the severity allow-list to Dependabot dismissals as well.
    pub gate_dependabot_severity: bool,

    /// Per-product switches.
    pub features: FeatureToggles,

    /// Repository-specific reviewer teams.
    pub teams: Vec<TeamRoute>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            team: TeamSlug::default_reviewers(),
            tools: Vec::new(),
            severities: Vec::new(),
            require_dismissal_comment: false,
            gate_dependabot_severity: false,
            features: FeatureToggles::default(),
            teams: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// [`PolicyError::Configuration`] if a team slug is empty or a team route
    /// lists a repository not in `owner/name` form.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.team.as_str().trim().is_empty() {
            return Err(PolicyError::configuration("team name must not be empty"));
        }
        for route in &self.teams {
            if route.name.as_str().trim().is_empty() {
                return Err(PolicyError::configuration(
                    "routed team name must not be empty",
                ));
            }
            if let Some(bad) = route.repositories.iter().find(|r| !is_full_name(r)) {
                return Err(PolicyError::configuration(format!(
                    "team '{}' routes '{bad}', expected 'owner/repository'",
                    route.name
                )));
            }
        }
        Ok(())
    }

    /// Tool gate: `true` if the allow-list is empty or names `tool` exactly.
    pub fn accepts_tool(&self, tool: &str) -> bool {
        allows(&self.tools, tool)
    }

    /// Severity gate: `true` if the allow-list is empty or names `severity`
    /// exactly.
    pub fn accepts_severity(&self, severity: &str) -> bool {
        allows(&self.severities, severity)
    }

    /// Whether handlers for `kind` should act at all.
    pub fn is_enabled(&self, kind: AlertKind) -> bool {
        match kind {
            AlertKind::CodeScanning => self.features.code_scanning,
            AlertKind::SecretScanning => self.features.secret_scanning,
            AlertKind::Dependabot => self.features.dependabot,
        }
    }

    /// Resolves the reviewer team for `repository`.
    ///
    /// The first route whose repository list contains `owner/name` wins;
    /// otherwise the default team is returned. Matching ignores ASCII case,
    /// as GitHub does for owner and repository names.
    pub fn team_for(&self, repository: &RepositoryRef) -> &TeamSlug {
        let full_name = repository.full_name();
        self.teams
            .iter()
            .find(|route| {
                route
                    .repositories
                    .iter()
                    .any(|r| r.eq_ignore_ascii_case(&full_name))
            })
            .map(|route| &route.name)
            .unwrap_or(&self.team)
    }
}

/// Enables or disables the handling of each GHAS product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FeatureToggles {
    /// Code-scanning alerts.
    pub code_scanning: bool,
    /// Secret-scanning alerts.
    pub secret_scanning: bool,
    /// Dependabot alerts.
    pub dependabot: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            code_scanning: true,
            secret_scanning: true,
            dependabot: true,
        }
    }
}

/// Routes a set of repositories to a dedicated reviewer team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoute {
    /// Team slug.
    pub name: TeamSlug,
    /// Repositories, as `owner/name`.
    #[serde(default)]
    pub repositories: Vec<String>,
}

fn allows(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|entry| entry == value)
}

fn is_full_name(value: &str) -> bool {
    matches!(value.split_once('/'), Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OwnerLogin, RepositoryName};

    fn repo(owner: &str, name: &str) -> RepositoryRef {
        RepositoryRef::new(
            OwnerLogin::new(owner).unwrap(),
            RepositoryName::new(name).unwrap(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = PolicyConfig::default();
        assert_eq!(config.team.as_str(), "ghas-reviewers");
        assert!(config.tools.is_empty());
        assert!(!config.require_dismissal_comment);
        for kind in AlertKind::ALL {
            assert!(config.is_enabled(kind));
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_allow_lists_accept_everything() {
        let config = PolicyConfig::default();
        assert!(config.accepts_tool("CodeQL"));
        assert!(config.accepts_tool(""));
        assert!(config.accepts_severity("low"));
    }

    #[test]
    fn test_non_empty_allow_lists_reject_non_members() {
        let config = PolicyConfig {
            tools: vec!["CodeQL".to_string()],
            severities: vec!["high".to_string(), "critical".to_string()],
            ..PolicyConfig::default()
        };
        assert!(config.accepts_tool("CodeQL"));
        assert!(!config.accepts_tool("Semgrep"));
        assert!(!config.accepts_tool(""));
        assert!(config.accepts_severity("critical"));
        assert!(config.accepts_severity("high"));
        assert!(!config.accepts_severity("HIGH"));
        assert!(!config.accepts_tool("codeql"));
        assert!(!config.accepts_severity("medium"));
        assert!(!config.accepts_severity(""));
    }

    #[test]
    fn test_team_routing() {
        let config = PolicyConfig {
            teams: vec![TeamRoute {
                name: TeamSlug::new("octo-reviewers").unwrap(),
                repositories: vec![
                    "octocat/hello-world".to_string(),
                    "octocat/earth".to_string(),
                ],
            }],
            ..PolicyConfig::default()
        };

        assert_eq!(config.team_for(&repo("octocat", "earth")).as_str(), "octo-reviewers");
        assert_eq!(config.team_for(&repo("OctoCat", "Hello-World")).as_str(), "octo-reviewers");
        assert_eq!(config.team_for(&repo("octocat", "random-name")).as_str(), "ghas-reviewers");
    }

    #[test]
    fn test_validate_rejects_malformed_routes() {
        let config = PolicyConfig {
            teams: vec![TeamRoute {
                name: TeamSlug::new("octo-reviewers").unwrap(),
                repositories: vec!["hello-world".to_string()],
            }],
            ..PolicyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let config: PolicyConfig = serde_json::from_value(serde_json::json!({
            "team": "security",
            "severities": ["high"],
            "require-dismissal-comment": true,
            "features": { "secret-scanning": false },
        }))
        .unwrap();

        assert_eq!(config.team.as_str(), "security");
        assert!(config.require_dismissal_comment);
        assert!(!config.is_enabled(AlertKind::SecretScanning));
        assert!(config.is_enabled(AlertKind::Dependabot));
    }
}

//! Boot configuration.
//!
//! Settings come from command-line flags, falling back to environment
//! variables (a `.env` file is loaded first by `main`). An optional TOML policy
//! file supplies the per-feature and per-repository policy; flags given
//! explicitly override its scalar values.
//!
//! Everything is resolved and validated once, before the server binds. A
//! missing credential aborts start-up instead of failing the first delivery.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};
use github::{GitHubAppSettings, DEFAULT_API_URL};
use listener::{WebhookSecret, DEFAULT_WEBHOOK_PATH, HEALTH_PATH};
use policy::{AppId, PolicyConfig, PolicyError, TeamSlug};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Start-up configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GitHub App id is required (--github-app-id / GITHUB_APP_ID)")]
    MissingAppId,

    #[error(
        "GitHub App private key is required (--github-app-key / GITHUB_APP_KEY or --github-app-key-path / GITHUB_APP_KEY_PATH)"
    )]
    MissingPrivateKey,

    #[error(
        "webhook secret is required (--github-app-secret / GITHUB_APP_SECRET) unless verification is disabled"
    )]
    MissingWebhookSecret,

    #[error("failed to read {what} '{}': {source}", path.display())]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file '{}': {source}", path.display())]
    ParsePolicy {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    InvalidPolicy(#[from] PolicyError),

    #[error("invalid webhook endpoint '{0}': must start with '/' and must not be '/health'")]
    InvalidEndpoint(String),
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// GitHub App enforcing review of GitHub Advanced Security alerts.
#[derive(Debug, Parser)]
#[command(name = "ghas-reviewer", version, about, long_about = None)]
pub struct Args {
    /// GitHub App id.
    #[arg(long, env = "GITHUB_APP_ID")]
    pub github_app_id: Option<u64>,

    /// GitHub App private key (PEM; literal `\n` escapes are accepted).
    #[arg(long, env = "GITHUB_APP_KEY", hide_env_values = true, allow_hyphen_values = true)]
    pub github_app_key: Option<String>,

    /// Path to the GitHub App private key.
    #[arg(long, env = "GITHUB_APP_KEY_PATH")]
    pub github_app_key_path: Option<PathBuf>,

    /// Webhook secret configured on the GitHub App.
    #[arg(long, env = "GITHUB_APP_SECRET", hide_env_values = true)]
    pub github_app_secret: Option<String>,

    /// Accept unsigned webhook deliveries. Local development only.
    #[arg(long, env = "GHAS_DISABLE_WEBHOOK_VERIFICATION", value_parser = FalseyValueParser::new())]
    pub disable_webhook_verification: bool,

    /// Route receiving webhook deliveries.
    #[arg(long, env = "GITHUB_APP_ENDPOINT", default_value = DEFAULT_WEBHOOK_PATH)]
    pub github_app_endpoint: String,

    /// REST API base URL (GitHub Enterprise: `https://<host>/api/v3`).
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Address the HTTP server binds to.
    #[arg(long, env = "GHAS_BIND", default_value = "0.0.0.0:9000")]
    pub bind: SocketAddr,

    /// Security reviewer team.
    #[arg(long, env = "GITHUB_GHAS_TEAM")]
    pub ghas_team_name: Option<String>,

    /// Code scanning tools to act on (comma separated; empty means all).
    #[arg(long, env = "GHAS_TOOLS", value_delimiter = ',')]
    pub ghas_tools: Vec<String>,

    /// Severities to act on (comma separated; empty means all).
    #[arg(long, env = "GHAS_SEVERITIES", value_delimiter = ',')]
    pub ghas_severities: Vec<String>,

    /// Reopen code scanning alerts dismissed without a comment.
    #[arg(long, env = "GHAS_REQUIRE_DISMISSAL_COMMENT", value_parser = FalseyValueParser::new())]
    pub require_dismissal_comment: bool,

    /// TOML policy file.
    #[arg(long, env = "GHAS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Log output format.
    #[arg(long, env = "GHAS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for span export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Observability settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub debug: bool,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

/// Fully validated start-up configuration.
#[derive(Debug)]
pub struct BootConfig {
    pub app: GitHubAppSettings,
    pub secret: WebhookSecret,
    pub webhook_path: String,
    pub bind: SocketAddr,
    pub policy: PolicyConfig,
    pub logging: LoggingSettings,
}

impl Args {
    /// Resolves credentials, loads the policy file and validates everything.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for any missing or invalid setting.
    pub fn resolve(self) -> Result<BootConfig, ConfigError> {
        let app_id = self.github_app_id.ok_or(ConfigError::MissingAppId)?;
        let private_key_pem = self.private_key()?;

        let secret = match (&self.github_app_secret, self.disable_webhook_verification) {
            (_, true) => WebhookSecret::Disabled,
            (Some(secret), false) if !secret.is_empty() => WebhookSecret::new(secret.clone()),
            _ => return Err(ConfigError::MissingWebhookSecret),
        };

        if !self.github_app_endpoint.starts_with('/') || self.github_app_endpoint == HEALTH_PATH {
            return Err(ConfigError::InvalidEndpoint(self.github_app_endpoint));
        }

        let policy = self.policy()?;

        Ok(BootConfig {
            app: GitHubAppSettings {
                app_id: AppId::new(app_id),
                private_key_pem,
                api_url: self.github_api_url,
            },
            secret,
            webhook_path: self.github_app_endpoint,
            bind: self.bind,
            policy,
            logging: LoggingSettings {
                debug: self.debug,
                format: self.log_format,
                otlp_endpoint: self.otlp_endpoint.filter(|e| !e.trim().is_empty()),
            },
        })
    }

    fn private_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = self.github_app_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }
        match &self.github_app_key_path {
            Some(path) => read("private key", path),
            None => Err(ConfigError::MissingPrivateKey),
        }
    }

    fn policy(&self) -> Result<PolicyConfig, ConfigError> {
        let mut policy = match &self.config {
            Some(path) => {
                let text = read("policy file", path)?;
                toml::from_str(&text).map_err(|source| ConfigError::ParsePolicy {
                    path: path.clone(),
                    source,
                })?
            }
            None => PolicyConfig::default(),
        };

        if let Some(team) = self.ghas_team_name.as_deref().and_then(TeamSlug::new) {
            policy.team = team;
        }
        let tools = list(&self.ghas_tools);
        if !tools.is_empty() {
            policy.tools = tools;
        }
        let severities = list(&self.ghas_severities);
        if !severities.is_empty() {
            policy.severities = severities;
        }
        if self.require_dismissal_comment {
            policy.require_dismissal_comment = true;
        }

        policy.validate()?;
        Ok(policy)
    }
}

fn read(what: &'static str, path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })
}

/// Trims entries and drops empty ones (`GHAS_TOOLS=""` means "all").
fn list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

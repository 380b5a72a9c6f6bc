//! Request-scoped client sessions.
//!
//! [`GitHubApp`] is built once at start-up from the App id and private key. It
//! holds no tokens. For each webhook delivery it opens a [`ClientSession`],
//! which lazily builds at most one app client and one installation client and
//! drops both when the delivery has been handled.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use policy::{AlertGateway, AppId, GatewayError, GatewayFactory, InstallationId};

use crate::auth::{AppCredentials, AuthError};
use crate::client::ApiClient;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("ghas-reviewer/", env!("CARGO_PKG_VERSION"));

/// Start-up settings for [`GitHubApp`].
#[derive(Debug, Clone)]
pub struct GitHubAppSettings {
    /// Numeric App id.
    pub app_id: AppId,
    /// PEM-encoded RSA private key.
    pub private_key_pem: String,
    /// REST base URL (`https://api.github.com` or a GitHub Enterprise
    /// `https://host/api/v3`).
    pub api_url: String,
}

/// The GitHub App identity, shared by every delivery.
#[derive(Debug, Clone)]
pub struct GitHubApp {
    inner: Arc<AppInner>,
}

#[derive(Debug)]
struct AppInner {
    http: reqwest::Client,
    api_url: String,
    credentials: AppCredentials,
}

impl GitHubApp {
    /// Validates the credentials and builds the shared HTTP client.
    ///
    /// # Errors
    ///
    /// [`AuthError`] if the private key is invalid or the HTTP client cannot
    /// be built. Callers treat this as a start-up failure.
    pub fn new(settings: GitHubAppSettings) -> Result<Self, AuthError> {
        let credentials = AppCredentials::new(settings.app_id, &settings.private_key_pem)?;
        // Sign once so a key that parses but cannot sign fails at boot.
        credentials.app_jwt()?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::HttpClient(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(AppInner {
                http,
                api_url: settings.api_url.trim_end_matches('/').to_string(),
                credentials,
            }),
        })
    }

    /// The App's id.
    pub fn app_id(&self) -> AppId {
        self.inner.credentials.app_id()
    }

    /// Opens a session for one delivery. Does not authenticate.
    pub fn session(&self, installation: Option<InstallationId>) -> ClientSession {
        ClientSession {
            app: self.clone(),
            installation,
            app_client: OnceCell::new(),
            installation_client: OnceCell::new(),
        }
    }
}

impl GatewayFactory for GitHubApp {
    fn open_session(&self, installation: Option<InstallationId>) -> Box<dyn AlertGateway> {
        Box::new(self.session(installation))
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    token: String,
}

/// The two lazily-authenticated clients of one webhook delivery.
///
/// Never store a session (or a client borrowed from it) anywhere that outlives
/// the delivery: installation tokens expire after an hour and only grant
/// access to one installation.
#[derive(Debug)]
pub struct ClientSession {
    app: GitHubApp,
    installation: Option<InstallationId>,
    app_client: OnceCell<ApiClient>,
    installation_client: OnceCell<ApiClient>,
}

impl ClientSession {
    /// The installation this session acts for.
    pub fn installation(&self) -> Option<InstallationId> {
        self.installation
    }

    /// Returns `true` once the app client has been authenticated.
    pub fn has_app_client(&self) -> bool {
        self.app_client.initialized()
    }

    /// Returns `true` once the installation client has been authenticated.
    pub fn has_installation_client(&self) -> bool {
        self.installation_client.initialized()
    }

    /// Client authenticated as the App itself (JWT), built on first use.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Authentication`] if the JWT cannot be signed.
    pub async fn app_client(&self) -> Result<&ApiClient, GatewayError> {
        self.app_client
            .get_or_try_init(|| async {
                let jwt = self.app.inner.credentials.app_jwt().map_err(authentication)?;
                debug!(app_id = %self.app.app_id(), "Authenticated as GitHub App");
                Ok::<_, GatewayError>(ApiClient::new(
                    self.app.inner.http.clone(),
                    &self.app.inner.api_url,
                    &jwt,
                ))
            })
            .await
    }

    /// Client authenticated as the delivery's installation, built on first use
    /// by exchanging the App JWT for an installation access token.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MissingInstallation`] if the payload named no
    /// installation; [`GatewayError::Authentication`] if the token exchange
    /// fails for any reason.
    pub async fn installation_client(&self) -> Result<&ApiClient, GatewayError> {
        let installation = self.installation.ok_or(GatewayError::MissingInstallation)?;
        self.installation_client
            .get_or_try_init(|| async {
                let app = self.app_client().await?;
                let response = app
                    .post(
                        "create installation token",
                        &format!("/app/installations/{installation}/access_tokens"),
                        &serde_json::json!({}),
                    )
                    .await
                    .map_err(authentication)?
                    .success("create installation token")
                    .map_err(authentication)?;
                let token: AccessToken = response
                    .json("create installation token")
                    .map_err(authentication)?;

                debug!(%installation, "Authenticated as GitHub App installation");
                Ok::<_, GatewayError>(ApiClient::new(
                    self.app.inner.http.clone(),
                    &self.app.inner.api_url,
                    &token.token,
                ))
            })
            .await
    }
}

fn authentication(error: impl std::fmt::Display) -> GatewayError {
    GatewayError::Authentication {
        message: error.to_string(),
    }
}

//! Authenticated REST transport.
//!
//! An [`ApiClient`] is a `reqwest::Client` bound to one API base URL and one
//! credential (App JWT or installation token). It never retries and never
//! interprets status codes; callers decide what a 404 or 422 means for their
//! operation.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use policy::GatewayError;

/// Media type requested from the GitHub REST API.
pub const ACCEPT: &str = "application/vnd.github+json";

/// REST API version pinned for every request.
pub const API_VERSION: &str = "2022-11-28";

/// A raw HTTP response: status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body (may be empty).
    pub body: String,
}

impl ApiResponse {
    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialises the body.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self, operation: &str) -> Result<T, GatewayError> {
        serde_json::from_str(&self.body).map_err(|e| GatewayError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    /// Converts an unexpected status into a [`GatewayError::Status`].
    pub fn into_error(self, operation: &str) -> GatewayError {
        GatewayError::Status {
            operation: operation.to_string(),
            status: self.status,
            body: self.body,
        }
    }

    /// Returns `self` for 2xx statuses and an error otherwise.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Status`] for any non-2xx status.
    pub fn success(self, operation: &str) -> Result<Self, GatewayError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error(operation))
        }
    }
}

/// A REST client holding one credential.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    authorization: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.api_base)
            .field("authorization", &"<redacted>")
            .finish()
    }
}

impl ApiClient {
    /// Creates a client sending `Authorization: Bearer <token>`.
    pub fn new(http: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bearer {token}"),
        }
    }

    /// Absolute URL for an API path starting with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Sends one request and collects status and body.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Transport`] if no response was received.
    pub async fn send(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, GatewayError> {
        let url = self.url(path);
        trace!(%method, %url, operation, "GitHub API request");

        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |e: reqwest::Error| GatewayError::Transport {
            operation: operation.to_string(),
            message: e.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        trace!(status, operation, "GitHub API response");
        Ok(ApiResponse { status, body })
    }

    /// `GET path`.
    pub async fn get(&self, operation: &str, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(operation, Method::GET, path, None).await
    }

    /// `POST path` with a JSON body.
    pub async fn post(
        &self,
        operation: &str,
        path: &str,
        body: &Value,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(operation, Method::POST, path, Some(body)).await
    }

    /// `PATCH path` with a JSON body.
    pub async fn patch(
        &self,
        operation: &str,
        path: &str,
        body: &Value,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(operation, Method::PATCH, path, Some(body)).await
    }
}

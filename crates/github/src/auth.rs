//! GitHub App credentials and JWT signing.
//!
//! App-level calls authenticate with a short-lived RS256 JWT signed by the
//! App's private key. Installation-level calls exchange that JWT for an
//! installation access token (see [`crate::session`]).

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use policy::AppId;
use serde::Serialize;
use thiserror::Error;

/// Seconds the `iat` claim is back-dated to tolerate clock drift with GitHub.
const CLOCK_DRIFT_SECS: i64 = 60;

/// JWT lifetime. GitHub rejects tokens valid for more than ten minutes.
const JWT_LIFETIME_SECS: i64 = 9 * 60;

/// Failures while preparing App credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured private key is not a PEM-encoded RSA key.
    #[error("GitHub App private key is not a valid RSA PEM: {0}")]
    InvalidPrivateKey(String),

    /// The JWT could not be signed.
    #[error("failed to sign GitHub App JWT: {0}")]
    Signing(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Serialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// App id plus parsed private key.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: AppId,
    key: EncodingKey,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl AppCredentials {
    /// Parses the PEM private key.
    ///
    /// Literal `\n` sequences are turned into newlines first, so keys passed
    /// through single-line environment variables work unchanged.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidPrivateKey`] if the PEM cannot be parsed.
    pub fn new(app_id: AppId, private_key_pem: &str) -> Result<Self, AuthError> {
        let pem = private_key_pem.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { app_id, key })
    }

    /// The App's id.
    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    /// Signs a fresh App JWT valid for nine minutes.
    ///
    /// # Errors
    ///
    /// [`AuthError::Signing`] if signing fails.
    pub fn app_jwt(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iat: now - CLOCK_DRIFT_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

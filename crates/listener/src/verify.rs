//! Webhook signature verification.
//!
//! GitHub signs each delivery with an HMAC of the raw body, keyed with the
//! App's webhook secret. `X-Hub-Signature-256` (`sha256=<hex>`) is checked when
//! present; only deliveries without it fall back to the legacy
//! `X-Hub-Signature` (`sha1=<hex>`). Exactly one scheme is checked per request.
//!
//! Digest comparison goes through [`Mac::verify_slice`], which is constant
//! time.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Header carrying the HMAC-SHA256 signature.
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";

/// Legacy header carrying the HMAC-SHA1 signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// The configured webhook secret, or an explicit opt-out.
#[derive(Clone)]
pub enum WebhookSecret {
    /// Verify every delivery with this key.
    Enabled(Vec<u8>),
    /// Accept unsigned deliveries. Intended for local development only.
    Disabled,
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookSecret::Enabled(_) => f.write_str("WebhookSecret::Enabled(<redacted>)"),
            WebhookSecret::Disabled => f.write_str("WebhookSecret::Disabled"),
        }
    }
}

impl WebhookSecret {
    /// Wraps a secret string.
    pub fn new(secret: impl Into<String>) -> Self {
        WebhookSecret::Enabled(secret.into().into_bytes())
    }
}

/// Which signature header a delivery was verified with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// `X-Hub-Signature-256`.
    Sha256,
    /// `X-Hub-Signature`.
    Sha1,
}

/// Result of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The signature matched.
    Verified(SignatureScheme),
    /// Verification is disabled by configuration.
    Skipped,
}

/// Why a delivery's signature was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Neither signature header is present.
    #[error("signature header missing; configure the App with a webhook secret or disable verification")]
    Missing,

    /// The header lacks the `sha256=` / `sha1=` prefix or the digest is not hex.
    #[error("malformed {header} header")]
    Malformed {
        /// Offending header name.
        header: &'static str,
    },

    /// The digest does not match the body.
    #[error("webhook signature verification failed")]
    Mismatch,
}

/// Verifies the delivery's signature against `secret`.
///
/// # Errors
///
/// See [`SignatureError`]. A rejected delivery must not be dispatched.
pub fn verify_signature(
    secret: &WebhookSecret,
    body: &[u8],
    headers: &HeaderMap,
) -> Result<Verification, SignatureError> {
    let key = match secret {
        WebhookSecret::Enabled(key) => key,
        WebhookSecret::Disabled => {
            warn!("Webhook signature verification is disabled; accepting unsigned delivery");
            return Ok(Verification::Skipped);
        }
    };

    if let Some(value) = header(headers, SIGNATURE_256_HEADER) {
        let digest = decode(value, "sha256=", SIGNATURE_256_HEADER)?;
        let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
        mac.update(body);
        return mac
            .verify_slice(&digest)
            .map(|_| Verification::Verified(SignatureScheme::Sha256))
            .map_err(|_| SignatureError::Mismatch);
    }

    if let Some(value) = header(headers, SIGNATURE_HEADER) {
        let digest = decode(value, "sha1=", SIGNATURE_HEADER)?;
        let mut mac = HmacSha1::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
        mac.update(body);
        return mac
            .verify_slice(&digest)
            .map(|_| Verification::Verified(SignatureScheme::Sha1))
            .map_err(|_| SignatureError::Mismatch);
    }

    Err(SignatureError::Missing)
}

/// Computes the `X-Hub-Signature-256` value GitHub would send for `body`.
pub fn sign_sha256(secret: &[u8], body: &[u8]) -> String {
    format!("sha256={}", signature_hex::<HmacSha256>(secret, body))
}

/// Computes the legacy `X-Hub-Signature` value GitHub would send for `body`.
pub fn sign_sha1(secret: &[u8], body: &[u8]) -> String {
    format!("sha1={}", signature_hex::<HmacSha1>(secret, body))
}

// HMAC accepts keys of any length; the key error branch never runs.
fn signature_hex<M: Mac + hmac::digest::KeyInit>(secret: &[u8], body: &[u8]) -> String {
    <M as Mac>::new_from_slice(secret)
        .map(|mut mac| {
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn decode(value: &str, prefix: &str, header: &'static str) -> Result<Vec<u8>, SignatureError> {
    value
        .strip_prefix(prefix)
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(SignatureError::Malformed { header })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = b"Hello, World!";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn secret() -> WebhookSecret {
        WebhookSecret::Enabled(SECRET.to_vec())
    }

    #[test]
    fn test_known_github_vector() {
        // Example from GitHub's "Validating webhook deliveries" documentation.
        assert_eq!(
            sign_sha256(SECRET, BODY),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_empty_secret_still_signs() {
        let signature = sign_sha256(b"", BODY);
        assert_eq!(signature.len(), "sha256=".len() + 64);
        let map = headers(&[(SIGNATURE_256_HEADER, &signature)]);
        assert!(verify_signature(&WebhookSecret::Enabled(Vec::new()), BODY, &map).is_ok());
        assert_eq!(sign_sha1(b"", BODY).len(), "sha1=".len() + 40);
    }

    #[test]
    fn test_valid_sha256_is_accepted() {
        let map = headers(&[(SIGNATURE_256_HEADER, &sign_sha256(SECRET, BODY))]);
        assert_eq!(
            verify_signature(&secret(), BODY, &map),
            Ok(Verification::Verified(SignatureScheme::Sha256))
        );
    }

    #[test]
    fn test_valid_sha1_is_accepted_without_sha256_header() {
        let map = headers(&[(SIGNATURE_HEADER, &sign_sha1(SECRET, BODY))]);
        assert_eq!(
            verify_signature(&secret(), BODY, &map),
            Ok(Verification::Verified(SignatureScheme::Sha1))
        );
    }

    #[test]
    fn test_sha256_is_preferred_over_legacy_header() {
        // A valid legacy signature does not rescue a bad sha256 one.
        let map = headers(&[
            (SIGNATURE_256_HEADER, &format!("sha256={}", "00".repeat(32))),
            (SIGNATURE_HEADER, &sign_sha1(SECRET, BODY)),
        ]);
        assert_eq!(
            verify_signature(&secret(), BODY, &map),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_single_bit_flip_in_body_is_rejected() {
        let map = headers(&[(SIGNATURE_256_HEADER, &sign_sha256(SECRET, BODY))]);
        for index in 0..BODY.len() {
            let mut body = BODY.to_vec();
            body[index] ^= 0x01;
            assert_eq!(
                verify_signature(&secret(), &body, &map),
                Err(SignatureError::Mismatch),
                "flipped byte {index}"
            );
        }
    }

    #[test]
    fn test_single_bit_flip_in_signature_is_rejected() {
        let signature = sign_sha256(SECRET, BODY);
        let digest = hex::decode(signature.trim_start_matches("sha256=")).unwrap();
        // First and last byte: an early-exit comparison would treat them differently.
        for index in [0, digest.len() - 1] {
            let mut flipped = digest.clone();
            flipped[index] ^= 0x80;
            let map = headers(&[(
                SIGNATURE_256_HEADER,
                &format!("sha256={}", hex::encode(&flipped)),
            )]);
            assert_eq!(
                verify_signature(&secret(), BODY, &map),
                Err(SignatureError::Mismatch)
            );
        }
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert_eq!(
            verify_signature(&secret(), BODY, &HeaderMap::new()),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn test_malformed_headers_are_rejected() {
        let digest = sign_sha256(SECRET, BODY);
        let unprefixed = digest.trim_start_matches("sha256=").to_string();
        for value in [unprefixed.as_str(), "sha256=zz", "sha1=abcd"] {
            let map = headers(&[(SIGNATURE_256_HEADER, value)]);
            assert_eq!(
                verify_signature(&secret(), BODY, &map),
                Err(SignatureError::Malformed {
                    header: SIGNATURE_256_HEADER
                })
            );
        }
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let map = headers(&[(SIGNATURE_256_HEADER, &sign_sha256(b"another secret", BODY))]);
        assert_eq!(
            verify_signature(&secret(), BODY, &map),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_disabled_verification_skips_check() {
        assert_eq!(
            verify_signature(&WebhookSecret::Disabled, BODY, &HeaderMap::new()),
            Ok(Verification::Skipped)
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", secret()).contains("Secret to Everybody"));
    }
}

//! Newtype domain identifiers.
//!
//! Every GitHub concept the reviewer acts on is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, an
//! [`AlertNumber`] with a [`PullRequestNumber`] even though both are `u64` under
//! the hood, or passing a [`UserLogin`] where a [`TeamSlug`] is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitHub-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: GitHub-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// The per-repository number of a GHAS alert (`alert.number` in the payload).
    AlertNumber
}

u64_id! {
    /// The number of a pull request, as parsed from a `refs/pull/<n>/...` ref.
    PullRequestNumber
}

u64_id! {
    /// Identifies one installation of the GitHub App (one org or account scope).
    InstallationId
}

u64_id! {
    /// The numeric id GitHub assigned to the App itself.
    AppId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed
// ---------------------------------------------------------------------------

/// Identifies a single webhook delivery.
///
/// Taken from the `X-GitHub-Delivery` header when GitHub supplies a GUID there;
/// otherwise generated fresh so every log line of one request can still be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the value of an `X-GitHub-Delivery` header, falling back to a
    /// random identifier when the header is absent or not a GUID.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Self)
            .unwrap_or_else(Self::new_random)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (GitHub names)
// ---------------------------------------------------------------------------

string_id! {
    /// The login of the organization or user that owns a repository.
    OwnerLogin
}

string_id! {
    /// The short name of a repository (without the owner prefix).
    RepositoryName
}

string_id! {
    /// The slug of an organization team (e.g. `"ghas-reviewers"`).
    ///
    /// GitHub addresses teams by slug in every REST path and in
    /// `team_reviewers` requests.
    TeamSlug
}

string_id! {
    /// The login of a GitHub user or bot account (e.g. `"octocat"`,
    /// `"ghas-reviewer[bot]"`).
    UserLogin
}

impl TeamSlug {
    /// The team used when no team is configured.
    pub fn default_reviewers() -> Self {
        Self("ghas-reviewers".to_string())
    }
}

/// A repository addressed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Owning organization or user.
    pub owner: OwnerLogin,
    /// Repository name.
    pub name: RepositoryName,
}

impl RepositoryRef {
    /// Creates a new repository reference.
    pub fn new(owner: OwnerLogin, name: RepositoryName) -> Self {
        Self { owner, name }
    }

    /// Returns the `owner/name` form used in GitHub URLs and team routing.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

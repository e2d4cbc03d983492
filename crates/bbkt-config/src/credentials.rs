//! Credential records: one named authentication profile.
//!
//! A record is either a static API token (sent as HTTP Basic with the account
//! email) or an OAuth 2.0 grant (sent as a Bearer token, refreshable).
//!
//! ```json
//! {
//!   "auth_type": "oauth",
//!   "created_at": "2025-01-01T10:00:00Z",
//!   "access_token": "...",
//!   "refresh_token": "...",
//!   "token_type": "bearer",
//!   "expires_in": 7200,
//!   "scopes": "repository pullrequest",
//!   "client_id": "...",
//!   "client_secret": "...",
//!   "accessible_workspaces": ["acme"]
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before nominal expiry at which an OAuth access token is treated as expired.
pub const EXPIRY_BUFFER: i64 = 5 * 60;

/// A single named authentication profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Profile name. Never persisted inside the record; back-filled from the store key.
    #[serde(skip)]
    pub profile_name: String,

    /// Kind-specific credential material.
    #[serde(flatten)]
    pub auth: AuthKind,

    /// Creation time, or time of the last successful (re)authentication.
    pub created_at: DateTime<Utc>,

    /// Workspaces this credential could enumerate when last cached. May be stale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessible_workspaces: Vec<String>,
}

/// Credential material, tagged on `auth_type`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_type")]
pub enum AuthKind {
    /// Atlassian API token (HTTP Basic with the account email).
    #[serde(rename = "api_token")]
    ApiToken {
        email: String,
        api_token: String,
        /// Raw scope string discovered at login, if the platform reported one.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        scopes: String,
    },

    /// OAuth 2.0 grant (Bearer auth).
    #[serde(rename = "oauth")]
    OAuth {
        access_token: String,
        #[serde(default)]
        refresh_token: String,
        #[serde(default)]
        token_type: String,
        #[serde(default)]
        expires_in: i64,
        #[serde(default)]
        scopes: String,
        #[serde(default)]
        client_id: String,
        #[serde(default)]
        client_secret: String,
    },
}

impl std::fmt::Debug for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiToken { email, scopes, .. } => f
                .debug_struct("ApiToken")
                .field("email", email)
                .field("api_token", &"<redacted>")
                .field("scopes", scopes)
                .finish(),
            Self::OAuth {
                token_type,
                expires_in,
                scopes,
                client_id,
                ..
            } => f
                .debug_struct("OAuth")
                .field("access_token", &"<redacted>")
                .field("refresh_token", &"<redacted>")
                .field("token_type", token_type)
                .field("expires_in", expires_in)
                .field("scopes", scopes)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

impl CredentialRecord {
    /// Create a record stamped with the current time.
    pub fn new(profile_name: impl Into<String>, auth: AuthKind) -> Self {
        Self {
            profile_name: profile_name.into(),
            auth,
            created_at: Utc::now(),
            accessible_workspaces: Vec::new(),
        }
    }

    /// Create an API token record.
    pub fn api_token(
        profile_name: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self::new(
            profile_name,
            AuthKind::ApiToken {
                email: email.into(),
                api_token: api_token.into(),
                scopes: String::new(),
            },
        )
    }

    /// Set the cached workspace list.
    pub fn with_workspaces(mut self, workspaces: Vec<String>) -> Self {
        self.accessible_workspaces = workspaces;
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// True if this record holds an OAuth grant.
    pub fn is_oauth(&self) -> bool {
        matches!(self.auth, AuthKind::OAuth { .. })
    }

    /// True if this record holds a static API token.
    pub fn is_api_token(&self) -> bool {
        matches!(self.auth, AuthKind::ApiToken { .. })
    }

    /// Human-readable kind.
    pub fn kind_label(&self) -> &'static str {
        match self.auth {
            AuthKind::ApiToken { .. } => "API token (Basic auth)",
            AuthKind::OAuth { .. } => "OAuth 2.0 (Bearer auth)",
        }
    }

    /// Account email for API token records.
    pub fn email(&self) -> Option<&str> {
        match &self.auth {
            AuthKind::ApiToken { email, .. } => Some(email),
            AuthKind::OAuth { .. } => None,
        }
    }

    /// Nominal expiry of an OAuth access token.
    ///
    /// `None` for static credentials, and for lifetimes too large to represent,
    /// which are treated as non-expiring.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.auth {
            AuthKind::OAuth { expires_in, .. } => Duration::try_seconds(expires_in)
                .and_then(|lifetime| self.created_at.checked_add_signed(lifetime)),
            AuthKind::ApiToken { .. } => None,
        }
    }

    /// Whether the access token must be refreshed before use at `now`.
    ///
    /// OAuth tokens count as expired from `EXPIRY_BUFFER` seconds before their
    /// nominal expiry onwards, boundary included. Static credentials never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expiry) => expiry
                .checked_sub_signed(Duration::seconds(EXPIRY_BUFFER))
                .is_none_or(|deadline| now >= deadline),
            None => false,
        }
    }

    /// [`is_expired_at`](Self::is_expired_at) against the current clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The raw scope string as returned by the provider.
    pub fn scopes_raw(&self) -> &str {
        match &self.auth {
            AuthKind::ApiToken { scopes, .. } | AuthKind::OAuth { scopes, .. } => scopes,
        }
    }

    /// Individual scope identifiers from the raw scope string.
    ///
    /// Providers use either spaces or commas as the delimiter.
    pub fn granted_scopes(&self) -> Vec<String> {
        split_scopes(self.scopes_raw())
    }

    /// Case-insensitive exact match against the cached workspace list.
    pub fn serves_workspace(&self, workspace: &str) -> bool {
        self.accessible_workspaces
            .iter()
            .any(|w| w.eq_ignore_ascii_case(workspace))
    }

    /// The secret with all but its first and last four characters hidden.
    pub fn masked_secret(&self) -> String {
        let secret = match &self.auth {
            AuthKind::ApiToken { api_token, .. } => api_token,
            AuthKind::OAuth { access_token, .. } => access_token,
        };
        mask(secret)
    }
}

/// Split a raw scope string on whitespace and commas.
pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

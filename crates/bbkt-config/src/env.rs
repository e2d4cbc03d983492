//! Environment overrides.
//!
//! Variables consumed:
//! - `BBKT_PROFILE`: explicit profile override
//! - `BITBUCKET_DISABLED_TOOLS`: comma-separated operation deny-list
//! - `BITBUCKET_ACCESS_TOKEN`: bearer token, bypasses the profile store
//! - `BITBUCKET_USERNAME` + `BITBUCKET_API_TOKEN`: basic credentials, bypass the profile store
//! - `BITBUCKET_OAUTH_CLIENT_ID` + `BITBUCKET_OAUTH_CLIENT_SECRET`: OAuth consumer for login
//!
//! Environment credentials outrank every stored profile. A bearer token
//! outranks username + API token.

use std::collections::HashSet;

pub const PROFILE_ENV: &str = "BBKT_PROFILE";
pub const DISABLED_TOOLS_ENV: &str = "BITBUCKET_DISABLED_TOOLS";
pub const ACCESS_TOKEN_ENV: &str = "BITBUCKET_ACCESS_TOKEN";
pub const USERNAME_ENV: &str = "BITBUCKET_USERNAME";
pub const API_TOKEN_ENV: &str = "BITBUCKET_API_TOKEN";
pub const OAUTH_CLIENT_ID_ENV: &str = "BITBUCKET_OAUTH_CLIENT_ID";
pub const OAUTH_CLIENT_SECRET_ENV: &str = "BITBUCKET_OAUTH_CLIENT_SECRET";

/// Static credentials supplied through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvCredentials {
    /// `BITBUCKET_ACCESS_TOKEN`.
    Bearer { token: String },
    /// `BITBUCKET_USERNAME` + `BITBUCKET_API_TOKEN`.
    Basic { username: String, password: String },
}

impl EnvCredentials {
    /// Which variables supplied these credentials.
    pub fn source(&self) -> &'static str {
        match self {
            EnvCredentials::Bearer { .. } => ACCESS_TOKEN_ENV,
            EnvCredentials::Basic { .. } => "BITBUCKET_USERNAME + BITBUCKET_API_TOKEN",
        }
    }
}

/// Snapshot of every environment override relevant to credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// Explicit profile override.
    pub profile: Option<String>,
    /// Operation names that must never be exposed.
    pub disabled_operations: HashSet<String>,
    /// Credentials that bypass the profile store.
    pub credentials: Option<EnvCredentials>,
    /// OAuth consumer key for `auth login --oauth`.
    pub oauth_client_id: Option<String>,
    /// OAuth consumer secret for `auth login --oauth`.
    pub oauth_client_secret: Option<String>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let credentials = match (get(ACCESS_TOKEN_ENV), get(USERNAME_ENV), get(API_TOKEN_ENV)) {
            (Some(token), _, _) => Some(EnvCredentials::Bearer { token }),
            (None, Some(username), Some(password)) => {
                Some(EnvCredentials::Basic { username, password })
            }
            _ => None,
        };

        Self {
            profile: get(PROFILE_ENV),
            disabled_operations: get(DISABLED_TOOLS_ENV)
                .map(|v| parse_deny_list(&v))
                .unwrap_or_default(),
            credentials,
            oauth_client_id: get(OAUTH_CLIENT_ID_ENV),
            oauth_client_secret: get(OAUTH_CLIENT_SECRET_ENV),
        }
    }
}

/// Parse a comma-separated deny-list, trimming entries and dropping empties.
pub fn parse_deny_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

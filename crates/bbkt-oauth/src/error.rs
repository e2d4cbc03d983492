//! Error types for OAuth login and refresh.

use bbkt_config::ConfigError;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur during OAuth login or token refresh.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// The token endpoint returned an error.
    #[error("Token endpoint error: {0}")]
    Backend(String),

    /// Invalid user input (pasted code, callback URL).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Refreshing a stored profile failed. The user has to log in again.
    #[error(
        "failed to refresh OAuth token for profile '{profile}': {reason}. Run 'bbkt auth login --oauth' again"
    )]
    RefreshFailed { profile: String, reason: String },

    /// The profile does not hold an OAuth grant.
    #[error("profile '{0}' does not use OAuth")]
    NotOAuth(String),

    /// Credential store error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl OAuthError {
    /// Whether the user must log in again.
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, OAuthError::RefreshFailed { .. })
    }
}

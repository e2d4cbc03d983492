//! Credential store error types.

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading, saving or resolving credential profiles.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The user's home directory could not be determined.
    #[error("could not determine home directory for the credential store")]
    NoHomeDir,

    /// Failed to read the credential store.
    #[error("failed to read credentials file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write the credential store.
    #[error("failed to write credentials file '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    /// The credential store exists but is not valid JSON in either known shape.
    #[error("credentials file '{path}' is corrupt: {source}")]
    StoreCorrupt {
        path: String,
        source: serde_json::Error,
    },

    /// Failed to serialize the store.
    #[error("failed to serialize profile store: {0}")]
    Serialize(serde_json::Error),

    /// An explicitly requested profile does not exist.
    #[error("profile '{0}' not found in credential store")]
    ProfileNotFound(String),

    /// No usable credential anywhere.
    #[error(
        "not authenticated. Run 'bbkt auth login', or set BITBUCKET_ACCESS_TOKEN, or BITBUCKET_USERNAME + BITBUCKET_API_TOKEN"
    )]
    NotAuthenticated,

    /// Local repository context could not be derived.
    #[error("{0}")]
    Context(String),
}

impl ConfigError {
    /// Whether this error means the user must (re-)authenticate.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ConfigError::NotAuthenticated)
    }
}

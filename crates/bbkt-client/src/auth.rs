//! Request authenticators.

use bbkt_config::{AuthKind, CredentialRecord, EnvCredentials};
use reqwest::RequestBuilder;

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Authenticator {
    /// HTTP Basic: account email (or username) plus API token.
    Basic { username: String, password: String },
    /// HTTP Bearer: OAuth access token or repository/workspace access token.
    Bearer { token: String },
}

impl Authenticator {
    /// Basic authenticator.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bearer authenticator.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Authenticator for a stored profile.
    ///
    /// OAuth records must already be fresh; no expiry check happens here.
    pub fn from_record(record: &CredentialRecord) -> Self {
        match &record.auth {
            AuthKind::ApiToken {
                email, api_token, ..
            } => Self::basic(email, api_token),
            AuthKind::OAuth { access_token, .. } => Self::bearer(access_token),
        }
    }

    /// Authenticator for credentials supplied through the environment.
    pub fn from_env(credentials: &EnvCredentials) -> Self {
        match credentials {
            EnvCredentials::Bearer { token } => Self::bearer(token),
            EnvCredentials::Basic { username, password } => Self::basic(username, password),
        }
    }

    /// Attach credentials to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
            Self::Bearer { token } => request.bearer_auth(token),
        }
    }

    /// Short label for status output.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "Basic",
            Self::Bearer { .. } => "Bearer",
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_token_record() {
        let record = CredentialRecord::api_token("p", "me@example.com", "tok");
        assert_eq!(
            Authenticator::from_record(&record),
            Authenticator::basic("me@example.com", "tok")
        );
    }

    #[test]
    fn test_from_oauth_record() {
        let record = CredentialRecord::new(
            "p",
            AuthKind::OAuth {
                access_token: "access".to_string(),
                refresh_token: String::new(),
                token_type: "bearer".to_string(),
                expires_in: 7200,
                scopes: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
            },
        );
        let auth = Authenticator::from_record(&record);
        assert_eq!(auth, Authenticator::bearer("access"));
        assert_eq!(auth.scheme(), "Bearer");
    }

    #[test]
    fn test_from_env() {
        let auth = Authenticator::from_env(&EnvCredentials::Basic {
            username: "u".to_string(),
            password: "p".to_string(),
        });
        assert_eq!(auth.scheme(), "Basic");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Authenticator::basic("me", "super-secret"));
        assert!(debug.contains("me"));
        assert!(!debug.contains("super-secret"));

        let debug = format!("{:?}", Authenticator::bearer("super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}

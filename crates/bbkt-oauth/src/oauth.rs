//! OAuth 2.0 authorization-code flow for Bitbucket Cloud.
//!
//! Bitbucket OAuth consumers authenticate to the token endpoint with HTTP
//! Basic (`client_id:client_secret`); request bodies are form-encoded.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use bbkt_config::{AuthKind, CredentialRecord};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{OAuthError, Result};

/// Bitbucket Cloud authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://bitbucket.org/site/oauth2/authorize";

/// Bitbucket Cloud token endpoint.
pub const TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";

/// OAuth consumer configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Consumer against the Bitbucket Cloud endpoints.
    pub fn bitbucket(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Point the token exchange at another endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the authorization URL the user opens in a browser.
pub fn build_authorization_url(config: &OAuthConfig, state: &str) -> String {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("response_type", "code"),
        ("state", state),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query)
}

/// Extract the authorization code from what the user pasted.
///
/// Accepts either the bare code or the full callback URL (`...?code=X&state=Y`).
/// When `expected_state` is given and the URL carries a state, they must match.
pub fn parse_callback_code(input: &str, expected_state: Option<&str>) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(OAuthError::InvalidRequest(
            "No authorization code provided".to_string(),
        ));
    }

    let Some((_, query)) = trimmed.split_once('?') else {
        if trimmed.contains('=') || trimmed.contains('/') {
            return Err(OAuthError::InvalidRequest(
                "Expected the authorization code or the full callback URL".to_string(),
            ));
        }
        return Ok(trimmed.to_string());
    };

    let query = query.split('#').next().unwrap_or_default();
    let mut code = None;
    let mut state = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map_err(|e| OAuthError::InvalidRequest(format!("Malformed callback URL: {}", e)))?
            .into_owned();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => {
                return Err(OAuthError::InvalidRequest(format!(
                    "Authorization was denied: {}",
                    value
                )));
            }
            _ => {}
        }
    }

    if let (Some(expected), Some(got)) = (expected_state, state.as_deref()) {
        if expected != got {
            return Err(OAuthError::InvalidRequest(
                "State mismatch in callback URL".to_string(),
            ));
        }
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("Callback URL has no code".to_string()))
}

/// Token endpoint response.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Space-delimited scopes granted to the consumer.
    #[serde(default)]
    pub scopes: String,
}

impl std::fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code_for_tokens(config: &OAuthConfig, code: &str) -> Result<OAuthTokens> {
    let form = [("grant_type", "authorization_code"), ("code", code)];
    post_token_request(config, &form, "Token exchange").await
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_access_token(
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<OAuthTokens> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    post_token_request(config, &form, "Token refresh").await
}

async fn post_token_request(
    config: &OAuthConfig,
    form: &[(&str, &str)],
    what: &str,
) -> Result<OAuthTokens> {
    let client = reqwest::Client::new();
    let response = client
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(form)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("{} request failed: {}", what, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(OAuthError::Backend(format!(
            "{} failed ({}): {}",
            what, status, error_text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthError::Backend(format!("Failed to parse {} response: {}", what, e)))
}

/// Build a stored OAuth profile from a fresh token response.
pub fn record_from_tokens(
    profile_name: impl Into<String>,
    config: &OAuthConfig,
    tokens: OAuthTokens,
    created_at: DateTime<Utc>,
) -> CredentialRecord {
    CredentialRecord::new(
        profile_name,
        AuthKind::OAuth {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            scopes: tokens.scopes,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        },
    )
    .with_created_at(created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_state_generation() {
        let state1 = generate_state();
        let state2 = generate_state();
        assert!(!state1.is_empty());
        assert_ne!(state1, state2);
    }

    #[test]
    fn test_authorization_url() {
        let config = OAuthConfig::bitbucket("my key", "secret");
        let url = build_authorization_url(&config, "test_state");

        assert!(url.starts_with("https://bitbucket.org/site/oauth2/authorize?"));
        assert!(url.contains("client_id=my%20key"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=test_state"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_parse_bare_code() {
        assert_eq!(parse_callback_code("  abc123 \n", None).unwrap(), "abc123");
    }

    #[test]
    fn test_parse_callback_url() {
        let code = parse_callback_code(
            "http://localhost:8080/callback?code=abc%2B123&state=xyz",
            Some("xyz"),
        )
        .unwrap();
        assert_eq!(code, "abc+123");
    }

    #[test]
    fn test_parse_callback_rejects_bad_input() {
        assert!(parse_callback_code("", None).is_err());
        assert!(parse_callback_code("http://localhost/callback?state=xyz", None).is_err());
        assert!(parse_callback_code("http://localhost/callback?code=a&state=other", Some("xyz")).is_err());
        assert!(parse_callback_code("http://localhost/callback?error=access_denied", None).is_err());
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let debug = format!("{:?}", OAuthConfig::bitbucket("id", "very-secret"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_tokens_debug_redacts_secrets() {
        let tokens = OAuthTokens {
            access_token: "live-access-token".to_string(),
            refresh_token: "live-refresh-token".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 7200,
            scopes: "repository".to_string(),
        };
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("live-access-token"));
        assert!(!debug.contains("live-refresh-token"));
        assert!(debug.contains("7200"));
    }

    #[test]
    fn test_record_from_tokens() {
        let config = OAuthConfig::bitbucket("cid", "csecret");
        let now = Utc::now();
        let tokens = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 7200,
            scopes: "repository pullrequest".to_string(),
        };

        let record = record_from_tokens("work", &config, tokens, now);
        assert_eq!(record.profile_name, "work");
        assert!(record.is_oauth());
        assert_eq!(record.created_at, now);
        assert!(!record.is_expired_at(now));
        match record.auth {
            AuthKind::OAuth {
                client_id,
                client_secret,
                ..
            } => {
                assert_eq!(client_id, "cid");
                assert_eq!(client_secret, "csecret");
            }
            _ => panic!("expected OAuth record"),
        }
    }

    #[tokio::test]
    async fn test_refresh_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/site/oauth2/access_token"))
            // base64("cid:csecret")
            .and(header("authorization", "Basic Y2lkOmNzZWNyZXQ="))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "token_type": "bearer",
                "expires_in": 7200,
                "scopes": "repository"
            })))
            .mount(&server)
            .await;

        let config = OAuthConfig::bitbucket("cid", "csecret")
            .with_token_url(format!("{}/site/oauth2/access_token", server.uri()));
        let tokens = refresh_access_token(&config, "old-refresh").await.unwrap();
        assert_eq!(tokens.access_token, "new-access");
        assert_eq!(tokens.refresh_token, "new-refresh");
        assert_eq!(tokens.expires_in, 7200);
    }

    #[tokio::test]
    async fn test_exchange_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error": "invalid_grant", "error_description": "Invalid code"}"#,
            ))
            .mount(&server)
            .await;

        let config = OAuthConfig::bitbucket("cid", "csecret").with_token_url(server.uri());
        let err = exchange_code_for_tokens(&config, "bad").await.unwrap_err();
        assert!(matches!(err, OAuthError::Backend(ref m) if m.contains("invalid_grant")));
    }
}

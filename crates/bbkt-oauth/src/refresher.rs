//! In-place refresh of stored OAuth profiles.
//!
//! An expired OAuth profile is refreshed once, right before it is first used
//! to build an authenticator. On success the new access token replaces the old
//! one in the profile store and the whole store is written back. Any failure is
//! terminal for the invocation; the stored record is left as it was.

use async_trait::async_trait;
use bbkt_config::{AuthKind, ConfigError, CredentialRecord, CredentialStore, ProfileStore};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{OAuthError, Result};
use crate::oauth::{OAuthConfig, OAuthTokens, TOKEN_URL, refresh_access_token};

// ============================================================================
// TokenEndpoint Trait
// ============================================================================

/// Exchanges refresh tokens for new access tokens.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Redeem `refresh_token` with the consumer's credentials.
    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens>;
}

/// The Bitbucket Cloud token endpoint.
#[derive(Debug, Clone)]
pub struct BitbucketTokenEndpoint {
    token_url: String,
}

impl BitbucketTokenEndpoint {
    pub fn new() -> Self {
        Self {
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Use a different token URL.
    pub fn with_token_url(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
        }
    }
}

impl Default for BitbucketTokenEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenEndpoint for BitbucketTokenEndpoint {
    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens> {
        let config = OAuthConfig::bitbucket(client_id, client_secret).with_token_url(&self.token_url);
        refresh_access_token(&config, refresh_token).await
    }
}

// ============================================================================
// OAuthRefresher
// ============================================================================

/// Refreshes stored OAuth profiles through a [`TokenEndpoint`].
#[derive(Debug, Clone)]
pub struct OAuthRefresher<E = BitbucketTokenEndpoint> {
    endpoint: E,
}

impl OAuthRefresher<BitbucketTokenEndpoint> {
    /// Refresher against Bitbucket Cloud.
    pub fn bitbucket() -> Self {
        Self::new(BitbucketTokenEndpoint::new())
    }
}

impl<E: TokenEndpoint> OAuthRefresher<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    /// Return the named profile, refreshing it first if it is expired at `now`.
    ///
    /// Static profiles and unexpired OAuth profiles are returned unchanged.
    pub async fn ensure_fresh(
        &self,
        file: &CredentialStore,
        store: &mut ProfileStore,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialRecord> {
        let record = store
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;

        if !record.is_expired_at(now) {
            return Ok(record.clone());
        }

        info!(profile = name, "OAuth token expired, refreshing");
        self.refresh(file, store, name, now).await
    }

    /// Refresh the named OAuth profile unconditionally and persist the store.
    ///
    /// Overwrites the access token, its lifetime and `created_at`. A rotated
    /// refresh token or changed scopes returned by the provider are kept too.
    /// `store` is only modified once the new state has been written to disk.
    pub async fn refresh(
        &self,
        file: &CredentialStore,
        store: &mut ProfileStore,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialRecord> {
        let failed = |reason: String| OAuthError::RefreshFailed {
            profile: name.to_string(),
            reason,
        };

        let record = store
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;

        let AuthKind::OAuth {
            refresh_token,
            client_id,
            client_secret,
            ..
        } = &record.auth
        else {
            return Err(OAuthError::NotOAuth(name.to_string()));
        };

        if refresh_token.is_empty() {
            return Err(failed("no refresh token stored".to_string()));
        }

        let tokens = self
            .endpoint
            .refresh(client_id, client_secret, refresh_token)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let mut updated = record.clone();
        apply_tokens(&mut updated, tokens, now);

        let mut next = store.clone();
        next.profiles.insert(name.to_string(), updated.clone());
        file.save(&next).map_err(|e| failed(e.to_string()))?;
        *store = next;

        debug!(profile = name, expires_at = ?updated.expires_at(), "OAuth token refreshed");
        Ok(updated)
    }
}

fn apply_tokens(record: &mut CredentialRecord, tokens: OAuthTokens, now: DateTime<Utc>) {
    if let AuthKind::OAuth {
        access_token,
        refresh_token,
        token_type,
        expires_in,
        scopes,
        ..
    } = &mut record.auth
    {
        *access_token = tokens.access_token;
        *expires_in = tokens.expires_in;
        if !tokens.refresh_token.is_empty() {
            *refresh_token = tokens.refresh_token;
        }
        if !tokens.token_type.is_empty() {
            *token_type = tokens.token_type;
        }
        if !tokens.scopes.is_empty() {
            *scopes = tokens.scopes;
        }
    }
    record.created_at = now;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::{TempDir, tempdir};

    /// Endpoint that hands out canned responses and records calls.
    struct MockEndpoint {
        response: Mutex<Option<Result<OAuthTokens>>>,
        calls: AtomicU32,
    }

    impl MockEndpoint {
        fn ok(tokens: OAuthTokens) -> Self {
            Self {
                response: Mutex::new(Some(Ok(tokens))),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Mutex::new(Some(Err(OAuthError::Backend(message.to_string())))),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TokenEndpoint for MockEndpoint {
        async fn refresh(&self, client_id: &str, _: &str, refresh_token: &str) -> Result<OAuthTokens> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(client_id, "cid");
            assert_eq!(refresh_token, "refresh-1");
            self.response
                .lock()
                .unwrap()
                .take()
                .expect("endpoint called more than once")
        }
    }

    fn new_tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "access-2".to_string(),
            refresh_token: String::new(),
            token_type: "bearer".to_string(),
            expires_in: 7200,
            scopes: String::new(),
        }
    }

    fn oauth_record(created_at: DateTime<Utc>, expires_in: i64) -> CredentialRecord {
        CredentialRecord::new(
            "work",
            AuthKind::OAuth {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                token_type: "bearer".to_string(),
                expires_in,
                scopes: "repository pullrequest".to_string(),
                client_id: "cid".to_string(),
                client_secret: "csecret".to_string(),
            },
        )
        .with_created_at(created_at)
        .with_workspaces(vec!["acme".to_string()])
    }

    fn persisted(record: CredentialRecord) -> (TempDir, CredentialStore, ProfileStore) {
        let temp = tempdir().unwrap();
        let file = CredentialStore::at(temp.path().join("credentials.json"));
        let store = file.save_profile(record).unwrap();
        (temp, file, store)
    }

    fn access_token(record: &CredentialRecord) -> &str {
        match &record.auth {
            AuthKind::OAuth { access_token, .. } => access_token,
            _ => panic!("expected OAuth record"),
        }
    }

    #[tokio::test]
    async fn test_expired_profile_is_refreshed_and_persisted() {
        let now = Utc::now();
        let (_temp, file, mut store) = persisted(oauth_record(now - Duration::hours(1), 3600));
        assert!(store.get("work").unwrap().is_expired_at(now));

        let refresher = OAuthRefresher::new(MockEndpoint::ok(new_tokens()));
        let record = refresher
            .ensure_fresh(&file, &mut store, "work", now)
            .await
            .unwrap();

        assert_eq!(access_token(&record), "access-2");
        assert_eq!(record.created_at, now);
        assert!(!record.is_expired_at(now));
        assert_eq!(refresher.endpoint.calls.load(Ordering::SeqCst), 1);

        // Unrotated fields survive
        match &record.auth {
            AuthKind::OAuth {
                refresh_token,
                scopes,
                ..
            } => {
                assert_eq!(refresh_token, "refresh-1");
                assert_eq!(scopes, "repository pullrequest");
            }
            _ => unreachable!(),
        }
        assert_eq!(record.accessible_workspaces, vec!["acme"]);

        let on_disk = file.load().unwrap().unwrap();
        let saved = on_disk.get("work").unwrap();
        assert_eq!(access_token(saved), "access-2");
        assert_eq!(saved.created_at, now);
        assert_eq!(store.get("work").unwrap(), saved);
    }

    #[tokio::test]
    async fn test_fresh_profile_is_not_refreshed() {
        let now = Utc::now();
        let (_temp, file, mut store) = persisted(oauth_record(now, 3600));

        let refresher = OAuthRefresher::new(MockEndpoint::ok(new_tokens()));
        let record = refresher
            .ensure_fresh(&file, &mut store, "work", now + Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(access_token(&record), "access-1");
        assert_eq!(refresher.endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_static_profile_passes_through() {
        let (_temp, file, mut store) =
            persisted(CredentialRecord::api_token("work", "me@example.com", "tok"));

        let refresher = OAuthRefresher::new(MockEndpoint::ok(new_tokens()));
        let record = refresher
            .ensure_fresh(&file, &mut store, "work", Utc::now())
            .await
            .unwrap();
        assert!(record.is_api_token());

        let err = refresher
            .refresh(&file, &mut store, "work", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::NotOAuth(_)));
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_kept() {
        let now = Utc::now();
        let (_temp, file, mut store) = persisted(oauth_record(now - Duration::hours(2), 3600));

        let tokens = OAuthTokens {
            refresh_token: "refresh-2".to_string(),
            scopes: "repository".to_string(),
            ..new_tokens()
        };
        let refresher = OAuthRefresher::new(MockEndpoint::ok(tokens));
        let record = refresher.refresh(&file, &mut store, "work", now).await.unwrap();

        match &record.auth {
            AuthKind::OAuth {
                refresh_token,
                scopes,
                ..
            } => {
                assert_eq!(refresh_token, "refresh-2");
                assert_eq!(scopes, "repository");
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_store_untouched() {
        let now = Utc::now();
        let created = now - Duration::hours(1);
        let (_temp, file, mut store) = persisted(oauth_record(created, 3600));
        let before = std::fs::read_to_string(file.path()).unwrap();

        let refresher = OAuthRefresher::new(MockEndpoint::failing("invalid_grant"));
        let err = refresher
            .ensure_fresh(&file, &mut store, "work", now)
            .await
            .unwrap_err();

        assert!(err.is_reauth_required());
        assert!(err.to_string().contains("invalid_grant"));
        assert!(err.to_string().contains("bbkt auth login"));

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), before);
        let record = store.get("work").unwrap();
        assert_eq!(access_token(record), "access-1");
        assert_eq!(record.created_at, created);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails() {
        let now = Utc::now();
        let mut record = oauth_record(now - Duration::hours(1), 3600);
        if let AuthKind::OAuth { refresh_token, .. } = &mut record.auth {
            refresh_token.clear();
        }
        let (_temp, file, mut store) = persisted(record);

        let refresher = OAuthRefresher::new(MockEndpoint::ok(new_tokens()));
        let err = refresher
            .ensure_fresh(&file, &mut store, "work", now)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::RefreshFailed { ref profile, .. } if profile == "work"));
        assert_eq!(refresher.endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_profile() {
        let (_temp, file, mut store) = persisted(oauth_record(Utc::now(), 3600));
        let refresher = OAuthRefresher::new(MockEndpoint::ok(new_tokens()));
        let err = refresher
            .ensure_fresh(&file, &mut store, "nope", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Config(ConfigError::ProfileNotFound(_))));
    }

    #[tokio::test]
    async fn test_bitbucket_endpoint_against_mock_server() {
        use wiremock::matchers::{body_string_contains, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "from-server",
                "expires_in": 7200,
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;

        let now = Utc::now();
        let (_temp, file, mut store) = persisted(oauth_record(now - Duration::hours(1), 3600));

        let refresher = OAuthRefresher::new(BitbucketTokenEndpoint::with_token_url(server.uri()));
        let record = refresher
            .ensure_fresh(&file, &mut store, "work", now)
            .await
            .unwrap();
        assert_eq!(access_token(&record), "from-server");
    }
}

//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use bbkt_config::credentials::split_scopes;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{UserApi, WorkspacesApi};
use crate::auth::Authenticator;
use crate::error::{Error, ErrorResponse, Result};

/// Bitbucket Cloud REST API root.
pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0/";

/// Response header carrying the scopes granted to the calling token.
pub const SCOPES_HEADER: &str = "x-oauth-scopes";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bitbucket API client.
///
/// Cheap to clone; clones share one connection pool and authenticator.
#[derive(Clone)]
pub struct BitbucketClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    auth: Authenticator,
    timeout: Duration,
}

impl BitbucketClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client for the public Bitbucket Cloud API.
    pub fn new(auth: Authenticator) -> Result<Self> {
        Self::builder().authenticator(auth).build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The authenticator attached to every request.
    pub fn authenticator(&self) -> &Authenticator {
        &self.inner.auth
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the user API.
    pub fn user(&self) -> UserApi {
        UserApi::new(self.clone())
    }

    /// Access the workspaces API.
    pub fn workspaces(&self) -> WorkspacesApi {
        WorkspacesApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope discovery
    // ─────────────────────────────────────────────────────────────────────────

    /// Perform an authenticated GET, returning the body and the scopes the
    /// platform reported for the token, if it reported any.
    pub async fn get_with_scopes(
        &self,
        path: &str,
    ) -> Result<(serde_json::Value, Option<Vec<String>>)> {
        let response = self.send_get(path, &[]).await?;
        let scopes = response
            .headers()
            .get(SCOPES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(split_scopes);
        let body = response.json().await?;
        Ok((body, scopes))
    }

    /// Scopes granted to the current token.
    ///
    /// An empty list means the platform did not report scopes for this
    /// credential kind.
    pub async fn granted_scopes(&self) -> Result<Vec<String>> {
        let (_, scopes) = self.get_with_scopes("user").await?;
        let scopes = scopes.unwrap_or_default();
        tracing::debug!(count = scopes.len(), "Discovered token scopes");
        Ok(scopes)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Make a GET request and deserialize the body.
    pub(crate) async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send_get(path, query).await?;
        Ok(response.json().await?)
    }

    /// Send an authenticated GET; non-success statuses become errors.
    async fn send_get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = self.url(path)?;
        tracing::debug!(%url, "GET");
        let request = self
            .inner
            .http
            .get(url)
            .query(query)
            .timeout(self.inner.timeout);
        let response = self.inner.auth.apply(request).send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => err.error.message,
            Err(_) => format!("{} {}", status, reason),
        };

        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }
}

/// Builder for creating a BitbucketClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    auth: Option<Authenticator>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Override the API root (tests, proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request authenticator.
    pub fn authenticator(mut self, auth: Authenticator) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<BitbucketClient> {
        let auth = self
            .auth
            .ok_or_else(|| Error::Config("an authenticator is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&self.base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("bbkt/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(BitbucketClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                auth,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

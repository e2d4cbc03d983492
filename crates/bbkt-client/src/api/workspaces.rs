//! Workspaces API.

use tracing::warn;

use crate::client::BitbucketClient;
use crate::error::Result;
use crate::types::{Paginated, Workspace};

/// Page size used when caching the accessible workspace list.
const CACHE_PAGELEN: u32 = 100;

/// Workspaces API client.
pub struct WorkspacesApi {
    client: BitbucketClient,
}

impl WorkspacesApi {
    pub(crate) fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// First page of workspaces visible to the credential.
    pub async fn list(&self, pagelen: u32) -> Result<Paginated<Workspace>> {
        let query = [("pagelen", pagelen.to_string()), ("page", "1".to_string())];
        self.client.get("workspaces", &query).await
    }

    /// Slugs of the workspaces the credential can see.
    ///
    /// Only the first page of up to 100 entries is read.
    pub async fn slugs(&self) -> Result<Vec<String>> {
        let page = self.list(CACHE_PAGELEN).await?;
        Ok(page.values.into_iter().map(|w| w.slug).collect())
    }

    /// Like [`slugs`](Self::slugs), but failures yield an empty list.
    ///
    /// For populating a fresh cache, where nothing is lost on failure.
    pub async fn accessible_slugs(&self) -> Vec<String> {
        self.slugs().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not list accessible workspaces");
            Vec::new()
        })
    }
}

//! User API.

use crate::client::BitbucketClient;
use crate::error::Result;
use crate::types::User;

/// User API client.
pub struct UserApi {
    client: BitbucketClient,
}

impl UserApi {
    pub(crate) fn new(client: BitbucketClient) -> Self {
        Self { client }
    }

    /// The account the credential belongs to.
    ///
    /// Scoped API tokens without `read:user:bitbucket` get a 403 here even
    /// though the credential itself is valid.
    pub async fn current(&self) -> Result<User> {
        self.client.get("user", &[]).await
    }
}

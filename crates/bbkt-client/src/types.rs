//! Bitbucket API response types.

use serde::{Deserialize, Serialize};

/// One page of a paginated Bitbucket collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    /// URL of the next page, absent on the last page.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub pagelen: Option<u32>,
    /// Total item count, when the platform computes it.
    #[serde(default)]
    pub size: Option<u64>,
}

impl<T> Paginated<T> {
    /// True if more pages follow.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// A workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub uuid: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

/// The authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub account_id: String,
}

//! Per-process capability gate.

use std::collections::HashSet;

use async_trait::async_trait;
use bbkt_client::BitbucketClient;
use serde::Serialize;
use tracing::{debug, warn};

use crate::capability::{CapabilityTag, is_granted};
use crate::error::{GateError, Result};
use crate::operations::{OPERATIONS, Operation, required_capability};

/// Something that can report the scopes granted to the current token.
#[async_trait]
pub trait ScopeSource: Send + Sync {
    /// Scopes granted to the token. Empty if the platform does not say.
    async fn granted_scopes(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl ScopeSource for BitbucketClient {
    async fn granted_scopes(&self) -> Result<Vec<String>> {
        BitbucketClient::granted_scopes(self)
            .await
            .map_err(|e| GateError::ScopeIntrospectionFailed(e.to_string()))
    }
}

/// Why an operation is or is not exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Exposed,
    /// Named in the deny-list.
    Denied,
    /// The token lacks the required capability.
    MissingScope(CapabilityTag),
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Exposed => write!(f, "exposed"),
            Decision::Denied => write!(f, "disabled"),
            Decision::MissingScope(tag) => write!(f, "missing {}", tag),
        }
    }
}

/// Decides which operations are exposed for the lifetime of the process.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CapabilityGate {
    granted: HashSet<String>,
    deny_list: HashSet<String>,
}

impl CapabilityGate {
    /// Gate over a known scope snapshot.
    pub fn new(
        granted: impl IntoIterator<Item = String>,
        deny_list: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            granted: granted.into_iter().collect(),
            deny_list: deny_list.into_iter().collect(),
        }
    }

    /// Fetch the token's scopes once and build the gate.
    ///
    /// Live scopes reported by the platform win. When the platform reports
    /// none, or the lookup fails, the scopes cached with the credential at
    /// login are used instead. With neither, the gate fails open: everything
    /// not deny-listed is exposed.
    pub async fn introspect<S>(
        source: &S,
        cached: Vec<String>,
        deny_list: HashSet<String>,
    ) -> Self
    where
        S: ScopeSource + ?Sized,
    {
        let live = match source.granted_scopes().await {
            Ok(scopes) => scopes,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        };

        let granted = if !live.is_empty() {
            live
        } else if !cached.is_empty() {
            debug!("Using scopes cached with the credential");
            cached
        } else {
            warn!("Token scopes unknown; exposing all operations not explicitly disabled");
            Vec::new()
        };

        debug!(
            scopes = ?granted,
            disabled = deny_list.len(),
            "Capability gate initialized"
        );
        Self::new(granted, deny_list)
    }

    /// The scope snapshot. Empty means unknown.
    pub fn granted_scopes(&self) -> &HashSet<String> {
        &self.granted
    }

    /// Whether scope data is available (false means the gate is failing open).
    pub fn scopes_known(&self) -> bool {
        !self.granted.is_empty()
    }

    /// Decide a single operation.
    pub fn decide(&self, operation: &str) -> Decision {
        if self.deny_list.contains(operation) {
            return Decision::Denied;
        }
        match required_capability(operation) {
            Some(tag) if !is_granted(&self.granted, Some(tag)) => Decision::MissingScope(tag),
            _ => Decision::Exposed,
        }
    }

    /// Whether `operation` should be exposed.
    pub fn is_permitted(&self, operation: &str) -> bool {
        self.decide(operation) == Decision::Exposed
    }

    /// The subset of `operations` to expose, in input order.
    pub fn filter_operations(&self, operations: &[Operation]) -> Vec<Operation> {
        operations
            .iter()
            .filter(|op| self.is_permitted(op.name))
            .copied()
            .collect()
    }

    /// Decision for every known operation, for diagnostics.
    pub fn decisions(&self) -> Vec<(Operation, Decision)> {
        OPERATIONS
            .iter()
            .map(|op| (*op, self.decide(op.name)))
            .collect()
    }
}

//! Profile resolution: picks exactly one stored profile for this invocation.
//!
//! Priority, first match wins:
//! 1. Explicit override (`--profile` / `BBKT_PROFILE`). A missing name is an
//!    error; it is never reinterpreted through the later tiers.
//! 2. Repository context: the first profile whose cached workspaces contain the
//!    local repository's workspace (case-insensitive).
//! 3. The store's active profile.
//! 4. Any profile at all, if the active pointer dangles.
//!
//! Tiers 2 and 4 scan the profile map in its iteration order, which is
//! unspecified. When several profiles could serve the same workspace, or the
//! active pointer dangles with several profiles stored, which one is returned
//! is not defined.

use tracing::debug;

use crate::credentials::CredentialRecord;
use crate::store::ProfileStore;
use crate::{ConfigError, Result};

/// A resolved profile and how it was chosen.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    /// The profile to authenticate with.
    pub record: CredentialRecord,
    /// How it was chosen, for diagnostics.
    pub resolved_from: ResolvedFrom,
}

/// Which resolution tier produced the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// Named explicitly by the caller.
    Override,
    /// Matched the local repository's workspace.
    WorkspaceContext { workspace: String },
    /// The store's active profile.
    ActiveProfile,
    /// Arbitrary profile because the active pointer named a missing profile.
    Fallback { missing: String },
}

impl std::fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFrom::Override => write!(f, "explicit override"),
            ResolvedFrom::WorkspaceContext { workspace } => {
                write!(f, "repository workspace '{}'", workspace)
            }
            ResolvedFrom::ActiveProfile => write!(f, "default profile"),
            ResolvedFrom::Fallback { missing } => {
                write!(f, "fallback (default profile '{}' not found)", missing)
            }
        }
    }
}

/// Resolve the profile to use.
///
/// `override_name` is the explicit request, `context_workspace` the workspace
/// inferred from the local repository, if any.
pub fn resolve_profile(
    store: &ProfileStore,
    override_name: Option<&str>,
    context_workspace: Option<&str>,
) -> Result<ResolvedProfile> {
    // 1. Explicit override
    if let Some(name) = override_name.filter(|n| !n.is_empty()) {
        let record = store
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;
        debug!(profile = name, "Resolved profile from explicit override");
        return Ok(ResolvedProfile {
            record: record.clone(),
            resolved_from: ResolvedFrom::Override,
        });
    }

    // 2. Repository context
    if let Some(workspace) = context_workspace.filter(|w| !w.is_empty()) {
        if let Some(record) = store.profiles.values().find(|r| r.serves_workspace(workspace)) {
            debug!(
                profile = %record.profile_name,
                workspace,
                "Resolved profile from repository workspace"
            );
            return Ok(ResolvedProfile {
                record: record.clone(),
                resolved_from: ResolvedFrom::WorkspaceContext {
                    workspace: workspace.to_string(),
                },
            });
        }
    }

    // 3. Active profile
    if let Some(record) = store.get(&store.active_profile) {
        return Ok(ResolvedProfile {
            record: record.clone(),
            resolved_from: ResolvedFrom::ActiveProfile,
        });
    }

    // 4. Anything we have
    if let Some(record) = store.profiles.values().next() {
        debug!(
            missing = %store.active_profile,
            profile = %record.profile_name,
            "Active profile missing, falling back"
        );
        return Ok(ResolvedProfile {
            record: record.clone(),
            resolved_from: ResolvedFrom::Fallback {
                missing: store.active_profile.clone(),
            },
        });
    }

    Err(ConfigError::NotAuthenticated)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Capability taxonomy and scope equivalence.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// A capability an operation can require.
///
/// Within a resource family admin implies write, and write implies read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityTag {
    RepositoryRead,
    RepositoryWrite,
    RepositoryAdmin,
    PullrequestRead,
    PullrequestWrite,
    PipelineRead,
    PipelineWrite,
    IssueRead,
    IssueWrite,
}

impl CapabilityTag {
    /// Every capability.
    pub const ALL: [CapabilityTag; 9] = [
        CapabilityTag::RepositoryRead,
        CapabilityTag::RepositoryWrite,
        CapabilityTag::RepositoryAdmin,
        CapabilityTag::PullrequestRead,
        CapabilityTag::PullrequestWrite,
        CapabilityTag::PipelineRead,
        CapabilityTag::PipelineWrite,
        CapabilityTag::IssueRead,
        CapabilityTag::IssueWrite,
    ];

    /// Canonical tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityTag::RepositoryRead => "repository-read",
            CapabilityTag::RepositoryWrite => "repository-write",
            CapabilityTag::RepositoryAdmin => "repository-admin",
            CapabilityTag::PullrequestRead => "pullrequest-read",
            CapabilityTag::PullrequestWrite => "pullrequest-write",
            CapabilityTag::PipelineRead => "pipeline-read",
            CapabilityTag::PipelineWrite => "pipeline-write",
            CapabilityTag::IssueRead => "issue-read",
            CapabilityTag::IssueWrite => "issue-write",
        }
    }

    /// The OAuth consumer scope that grants exactly this capability.
    pub fn oauth_scope(&self) -> &'static str {
        match self {
            CapabilityTag::RepositoryRead => "repository",
            CapabilityTag::RepositoryWrite => "repository:write",
            CapabilityTag::RepositoryAdmin => "repository:admin",
            CapabilityTag::PullrequestRead => "pullrequest",
            CapabilityTag::PullrequestWrite => "pullrequest:write",
            CapabilityTag::PipelineRead => "pipeline",
            CapabilityTag::PipelineWrite => "pipeline:write",
            CapabilityTag::IssueRead => "issue",
            CapabilityTag::IssueWrite => "issue:write",
        }
    }

    /// Raw scopes, in both dialects, that satisfy this capability.
    pub fn satisfying_scopes(&self) -> &'static [&'static str] {
        match self {
            CapabilityTag::RepositoryRead => &[
                "repository",
                "repository:write",
                "repository:admin",
                "read:repository:bitbucket",
                "write:repository:bitbucket",
                "admin:repository:bitbucket",
            ],
            CapabilityTag::RepositoryWrite => &[
                "repository:write",
                "repository:admin",
                "write:repository:bitbucket",
                "admin:repository:bitbucket",
            ],
            CapabilityTag::RepositoryAdmin => &["repository:admin", "admin:repository:bitbucket"],
            CapabilityTag::PullrequestRead => &[
                "pullrequest",
                "pullrequest:write",
                "read:pullrequest:bitbucket",
                "write:pullrequest:bitbucket",
            ],
            CapabilityTag::PullrequestWrite => {
                &["pullrequest:write", "write:pullrequest:bitbucket"]
            }
            CapabilityTag::PipelineRead => &[
                "pipeline",
                "pipeline:write",
                "read:pipeline:bitbucket",
                "write:pipeline:bitbucket",
            ],
            CapabilityTag::PipelineWrite => &["pipeline:write", "write:pipeline:bitbucket"],
            CapabilityTag::IssueRead => &[
                "issue",
                "issue:write",
                "read:issue:bitbucket",
                "write:issue:bitbucket",
            ],
            CapabilityTag::IssueWrite => &["issue:write", "write:issue:bitbucket"],
        }
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityTag {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CapabilityTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| GateError::UnknownCapability(s.to_string()))
    }
}

/// Whether `granted` satisfies `required`.
///
/// No requirement is always satisfied. An empty `granted` set means the
/// scopes are unknown and everything is granted.
pub fn is_granted(granted: &HashSet<String>, required: Option<CapabilityTag>) -> bool {
    let Some(required) = required else {
        return true;
    };
    if granted.is_empty() {
        return true;
    }

    granted.contains(required.as_str())
        || required
            .satisfying_scopes()
            .iter()
            .any(|scope| granted.contains(*scope))
}

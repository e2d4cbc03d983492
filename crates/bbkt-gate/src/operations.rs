//! The agent-facing operations and the capability each requires.

use serde::Serialize;

use crate::capability::CapabilityTag;

/// An agent-facing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub name: &'static str,
    pub description: &'static str,
}

impl Operation {
    /// Capability required to expose this operation.
    pub fn required_capability(&self) -> Option<CapabilityTag> {
        required_capability(self.name)
    }
}

/// Every operation bbkt can expose, in registration order.
pub const OPERATIONS: &[Operation] = &[
    Operation {
        name: "manage_workspaces",
        description: "Get and list Bitbucket workspaces",
    },
    Operation {
        name: "manage_repositories",
        description: "List, get, create and delete repositories",
    },
    Operation {
        name: "manage_refs",
        description: "List, create and delete branches and tags",
    },
    Operation {
        name: "manage_commits",
        description: "List and get commits, diffs and diffstats",
    },
    Operation {
        name: "manage_pull_requests",
        description: "Pull request operations (list, get, create, update, merge, approve, decline, diff)",
    },
    Operation {
        name: "manage_pr_comments",
        description: "Pull request comments (list, create, update, delete, resolve)",
    },
    Operation {
        name: "manage_source",
        description: "Source operations (read, list directory, history, search, write, delete)",
    },
    Operation {
        name: "manage_pipelines",
        description: "Bitbucket Pipelines (list, get, trigger, stop, steps, step logs)",
    },
    Operation {
        name: "manage_issues",
        description: "Repository issues (list, get, create, update)",
    },
];

/// Capability an operation requires. Unknown operations require none.
pub fn required_capability(operation: &str) -> Option<CapabilityTag> {
    match operation {
        "manage_repositories" | "manage_refs" | "manage_commits" | "manage_source" => {
            Some(CapabilityTag::RepositoryRead)
        }
        "manage_pull_requests" | "manage_pr_comments" => Some(CapabilityTag::PullrequestRead),
        "manage_pipelines" => Some(CapabilityTag::PipelineRead),
        "manage_issues" => Some(CapabilityTag::IssueRead),
        _ => None,
    }
}

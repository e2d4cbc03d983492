//! Local repository context.
//!
//! Infers the Bitbucket workspace and repository slug from the remotes of the
//! git repository in the current directory. Used as the "repository context"
//! tier of profile resolution and never fatal to it.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::{ConfigError, Result};

/// `git@bitbucket.org:workspace/repo(.git)`
static SSH_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git@bitbucket\.org:([^/]+)/([^/\s]+?)(?:\.git)?/?$").expect("valid regex")
});

/// `https://[user@]bitbucket.org/workspace/repo(.git)` and `ssh://git@bitbucket.org/...`
static URL_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?|ssh)://(?:[^@/]+@)?bitbucket\.org/([^/]+)/([^/\s]+?)(?:\.git)?/?$")
        .expect("valid regex")
});

/// A Bitbucket repository identified from a git remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    pub workspace: String,
    pub repo_slug: String,
}

/// Parse a single remote URL. Returns `None` for non-Bitbucket remotes.
pub fn parse_remote_url(url: &str) -> Option<RemoteRepo> {
    let url = url.trim();
    let caps = SSH_REMOTE
        .captures(url)
        .or_else(|| URL_REMOTE.captures(url))?;
    Some(RemoteRepo {
        workspace: caps[1].to_string(),
        repo_slug: caps[2].to_string(),
    })
}

/// Pick the first Bitbucket remote out of `git remote -v` output.
pub fn parse_remote_output(output: &str) -> Result<RemoteRepo> {
    let mut other_host = None;

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(_name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };

        if let Some(repo) = parse_remote_url(url) {
            return Ok(repo);
        }

        if other_host.is_none() {
            if url.contains("github.com") {
                other_host = Some("GitHub");
            } else if url.contains("gitlab.com") {
                other_host = Some("GitLab");
            }
        }
    }

    match other_host {
        Some(host) => Err(ConfigError::Context(format!(
            "detected a {} repository; bbkt only supports Bitbucket Cloud repositories",
            host
        ))),
        None => Err(ConfigError::Context(
            "no Bitbucket remotes found in the local repository".to_string(),
        )),
    }
}

/// Inspect the repository in the current directory.
pub fn local_repo() -> Result<RemoteRepo> {
    local_repo_in(Path::new("."))
}

/// Inspect the repository rooted at (or containing) `dir`.
pub fn local_repo_in(dir: &Path) -> Result<RemoteRepo> {
    let output = Command::new("git")
        .args(["remote", "-v"])
        .current_dir(dir)
        .output()
        .map_err(|e| ConfigError::Context(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(ConfigError::Context(
            "not a git repository or no remotes configured".to_string(),
        ));
    }

    parse_remote_output(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(workspace: &str, slug: &str) -> Option<RemoteRepo> {
        Some(RemoteRepo {
            workspace: workspace.to_string(),
            repo_slug: slug.to_string(),
        })
    }

    #[test]
    fn test_parse_ssh_urls() {
        assert_eq!(parse_remote_url("git@bitbucket.org:acme/widgets.git"), repo("acme", "widgets"));
        assert_eq!(parse_remote_url("git@bitbucket.org:acme/widgets"), repo("acme", "widgets"));
    }

    #[test]
    fn test_parse_https_urls() {
        assert_eq!(
            parse_remote_url("https://jdoe@bitbucket.org/acme/widgets.git"),
            repo("acme", "widgets")
        );
        assert_eq!(
            parse_remote_url("https://bitbucket.org/acme/widgets"),
            repo("acme", "widgets")
        );
        assert_eq!(
            parse_remote_url("ssh://git@bitbucket.org/acme/widgets.git"),
            repo("acme", "widgets")
        );
    }

    #[test]
    fn test_parse_other_hosts() {
        assert_eq!(parse_remote_url("git@github.com:acme/widgets.git"), None);
        assert_eq!(parse_remote_url("https://gitlab.com/acme/widgets"), None);
    }

    #[test]
    fn test_remote_output_first_bitbucket_wins() {
        let output = "\
upstream\thttps://github.com/acme/widgets.git (fetch)
origin\tgit@bitbucket.org:acme/widgets.git (fetch)
origin\tgit@bitbucket.org:acme/widgets.git (push)
mirror\tgit@bitbucket.org:other/widgets.git (fetch)
";
        let repo = parse_remote_output(output).unwrap();
        assert_eq!(repo.workspace, "acme");
        assert_eq!(repo.repo_slug, "widgets");
    }

    #[test]
    fn test_remote_output_github_only() {
        let output = "origin\tgit@github.com:acme/widgets.git (fetch)\n";
        let err = parse_remote_output(output).unwrap_err();
        assert!(err.to_string().contains("GitHub"));
    }

    #[test]
    fn test_remote_output_empty() {
        let err = parse_remote_output("").unwrap_err();
        assert!(err.to_string().contains("no Bitbucket remotes"));
    }
}

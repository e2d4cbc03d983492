//! CLI command handlers.

pub mod auth;
pub mod profile;
pub mod tools;

use bbkt_config::CredentialStore;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit profile override (`--profile` / `BBKT_PROFILE`).
    pub profile: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// The per-user credential store.
    pub fn store(&self) -> anyhow::Result<CredentialStore> {
        Ok(CredentialStore::open_default()?)
    }
}

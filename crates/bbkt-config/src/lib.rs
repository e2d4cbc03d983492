//! Credential profiles for bbkt.
//!
//! Provides the credential side of the Bitbucket integration:
//! - Named authentication profiles (API token or OAuth) with expiry queries
//! - A per-user JSON profile store with an "active" pointer and legacy migration
//! - Environment overrides that bypass the store entirely
//! - Local repository context (workspace inferred from `git remote -v`)
//! - Layered profile resolution (override → repository context → default → any)

pub mod context;
pub mod credentials;
pub mod env;
pub mod error;
pub mod paths;
pub mod resolver;
pub mod store;

pub use context::{RemoteRepo, local_repo, parse_remote_url};
pub use credentials::{AuthKind, CredentialRecord, EXPIRY_BUFFER};
pub use env::{EnvCredentials, EnvOverrides};
pub use error::{ConfigError, Result};
pub use paths::{config_dir, credentials_path};
pub use resolver::{ResolvedFrom, ResolvedProfile, resolve_profile};
pub use store::{CredentialStore, DEFAULT_PROFILE, ProfileStore};

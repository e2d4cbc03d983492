//! Authenticated HTTP client for the Bitbucket Cloud REST API.
//!
//! This crate is deliberately narrow: it knows how to authenticate requests
//! (Basic or Bearer), report which OAuth scopes the platform says the token
//! carries, and enumerate the workspaces a credential can see.
//!
//! # Example
//!
//! ```no_run
//! use bbkt_client::{Authenticator, BitbucketClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = BitbucketClient::builder()
//!     .authenticator(Authenticator::bearer("token"))
//!     .build()?;
//!
//! let scopes = client.granted_scopes().await?;
//! let workspaces = client.workspaces().accessible_slugs().await;
//! println!("{:?} {:?}", scopes, workspaces);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use api::{UserApi, WorkspacesApi};
pub use auth::Authenticator;
pub use client::{BitbucketClient, ClientBuilder, DEFAULT_BASE_URL, SCOPES_HEADER};
pub use error::{Error, Result};
pub use types::*;

//! Bitbucket OAuth 2.0 support for bbkt.
//!
//! - [`oauth`]: authorization-code flow: state, authorization URL, callback
//!   parsing, code exchange and refresh-token exchange
//! - [`refresher`]: refreshes an expired stored profile in place and persists
//!   the store

pub mod error;
pub mod oauth;
pub mod refresher;

pub use error::{OAuthError, Result};
pub use oauth::{OAuthConfig, OAuthTokens, record_from_tokens};
pub use refresher::{BitbucketTokenEndpoint, OAuthRefresher, TokenEndpoint};

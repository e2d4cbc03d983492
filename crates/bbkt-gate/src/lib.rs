//! Capability gating for bbkt's agent-facing operations.
//!
//! Each operation may require one [`CapabilityTag`]. Whether a token holds a
//! capability is decided against the scopes the platform reports for it, in
//! either of the two scope dialects Bitbucket uses:
//!
//! - OAuth consumer scopes: `repository`, `repository:write`, `pullrequest`, ...
//! - API token scopes: `read:repository:bitbucket`, `write:pipeline:bitbucket`, ...
//!
//! Scopes reported live by the platform take precedence over the scopes
//! cached with the credential at login.
//!
//! **Fail-open:** when no scopes are known from either source every
//! capability is granted. The remote API still rejects unauthorized calls when
//! they are made. An explicit deny-list always wins.

pub mod capability;
pub mod error;
pub mod gate;
pub mod operations;

pub use capability::{CapabilityTag, is_granted};
pub use error::{GateError, Result};
pub use gate::{CapabilityGate, Decision, ScopeSource};
pub use operations::{OPERATIONS, Operation, required_capability};

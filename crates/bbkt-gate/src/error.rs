//! Gate error types.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors raised while building a capability gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Granted scopes could not be fetched. Recovered by failing open.
    #[error("failed to fetch token scopes for introspection: {0}")]
    ScopeIntrospectionFailed(String),

    /// Unknown capability name.
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),
}

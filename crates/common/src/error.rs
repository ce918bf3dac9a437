//! Common error types for mesh authentication components.

use thiserror::Error;

/// Errors raised while interpreting shared primitive values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshAuthError {
    /// An auth type code that no handler variant is defined for.
    #[error("Unknown auth type code: {0}")]
    UnknownAuthType(u8),

    /// A value that could not be interpreted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

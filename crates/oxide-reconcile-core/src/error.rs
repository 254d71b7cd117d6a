//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while selecting a dialect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialectError {
    /// The dialect identifier or URL scheme is not supported.
    #[error("unsupported dialect: {0}")]
    Unsupported(String),
}

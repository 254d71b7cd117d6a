//! Error types for schema reconciliation.

use oxide_reconcile_core::DialectError;

/// Errors that can occur while reading or reconciling a table.
///
/// A statement failing inside the apply transaction is not an error: it is
/// reported through [`ReconciliationResult`](crate::ReconciliationResult).
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The connection URL names a driver this crate does not support.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// The table to reconcile does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Creating or filling the backup table failed. The live table was not
    /// touched.
    #[error("Failed to back up '{table}' into '{backup}': {source}")]
    Backup {
        /// The table being backed up.
        table: String,
        /// The backup table name.
        backup: String,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// The dialect cannot perform the requested operation.
    #[error("{dialect} does not support {message}")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// What was requested.
        message: String,
    },

    /// Database error while reading the schema or cleaning up.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading model or config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dialect selection error.
    #[error(transparent)]
    Dialect(#[from] DialectError),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

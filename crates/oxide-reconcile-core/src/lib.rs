//! # oxide-reconcile-core
//!
//! Dialect-aware schema reconciliation primitives.
//!
//! This crate provides:
//! - A canonical, dialect-independent column model ([`ColumnSpec`])
//! - A declarative field registry and the builder turning it into columns
//! - One strategy per database mapping canonical types to native ones and
//!   synthesizing `ALTER` statements
//! - A deterministic column differ
//!
//! Nothing here talks to a database. The `oxide-reconcile` crate adds the
//! live schema readers and the safe executor.
//!
//! ## Example
//!
//! ```rust
//! use oxide_reconcile_core::{ColumnSpec, Dialect, LogicalType, compare};
//!
//! let actual = vec![ColumnSpec::new("status", LogicalType::String).length(10)];
//! let desired = vec![
//!     ColumnSpec::new("status", LogicalType::String)
//!         .length(20)
//!         .default_value("'active'"),
//! ];
//!
//! let changes = compare(Dialect::MySql, &actual, &desired);
//! let statements = Dialect::MySql.synthesize("accounts", &changes);
//! assert_eq!(
//!     statements,
//!     vec!["ALTER TABLE `accounts` MODIFY COLUMN `status` VARCHAR(20) DEFAULT 'active'"]
//! );
//! ```

pub mod column;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod field;
pub mod model;

pub use column::{
    ColumnSpec, ForeignKeyAction, ForeignKeySpec, GeneratedMode, GeneratedSpec, IndexKind,
    IndexSpec, LogicalType, canonical_default, quote_literal,
};
pub use dialect::{
    Dialect, MigrationDialect, MySqlDialect, NativeType, PostgresDialect, SqliteDialect,
    is_advisory,
};
pub use diff::{
    Attribute, AttributeDiff, ChangeKind, ChangeSummary, ColumnChange, DiffWarning, compare,
    diff_warnings,
};
pub use error::DialectError;
pub use field::{Entity, FieldDescriptor, NativeKind, TableModel};
pub use model::build;

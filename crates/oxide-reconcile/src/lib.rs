//! # oxide-reconcile
//!
//! Reconciles live table columns with declarative models on SQLite,
//! PostgreSQL and MySQL.
//!
//! - [`introspect`] reads the live columns of a table into
//!   [`ColumnSpec`](oxide_reconcile_core::ColumnSpec)s
//! - [`SafeExecutor`] diffs them against the declared fields, backs the
//!   table up and applies the synthesized statements in one transaction
//! - [`ReportSink`] receives every [`ReconciliationResult`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use oxide_reconcile::prelude::*;
//!
//! struct Account;
//!
//! impl Entity for Account {
//!     const TABLE: &'static str = "accounts";
//!
//!     fn fields() -> Vec<FieldDescriptor> {
//!         vec![
//!             FieldDescriptor::new("id", NativeKind::I64).primary_key().auto_increment(),
//!             FieldDescriptor::new("status", NativeKind::String)
//!                 .size(20)
//!                 .default_literal("active"),
//!         ]
//!     }
//! }
//!
//! # async fn run() -> oxide_reconcile::Result<()> {
//! let pool = DatabasePool::connect("sqlite:app.db").await?;
//! let result = SafeExecutor::new(pool)
//!     .dry_run(true)
//!     .reconcile_entity::<Account>()
//!     .await?;
//! for statement in &result.statements {
//!     println!("{statement};");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod report;

pub use config::ExecutorOptions;
pub use connection::{DatabasePool, DatabaseTransaction};
pub use error::{ReconcileError, Result};
pub use executor::{
    ReconcilePlan, ReconciliationResult, SafeExecutor, backup_table_name, parse_backup_timestamp,
};
pub use report::{NullSink, ReportSink, TracingSink};

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::config::ExecutorOptions;
    pub use crate::connection::DatabasePool;
    pub use crate::error::{ReconcileError, Result};
    pub use crate::executor::{ReconcilePlan, ReconciliationResult, SafeExecutor};
    pub use crate::report::{NullSink, ReportSink, TracingSink};
    pub use oxide_reconcile_core::{
        ChangeKind, ColumnChange, ColumnSpec, Dialect, Entity, FieldDescriptor, IndexKind,
        LogicalType, NativeKind, TableModel,
    };
}

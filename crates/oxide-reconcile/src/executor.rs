//! Safe executor.
//!
//! Turns a [`ReconcilePlan`] into changes on the live database:
//!
//! 1. An empty plan succeeds without touching the database.
//! 2. In dry-run mode the statements are returned, never executed.
//! 3. With backups enabled the table is copied into
//!    `<table>_backup_<YYYYMMDDHHMMSS>` first. A backup failure aborts
//!    before any mutation.
//! 4. Every executable statement runs in one transaction. The first
//!    failure rolls everything back and the result carries the failing
//!    statement and, when a backup exists, recovery instructions.
//!
//! Advisory statements (`-- ...`) are reported but never executed.
//! Concurrent applies against the same table must be serialized by the
//! caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};
use oxide_reconcile_core::{
    ChangeSummary, ColumnChange, ColumnSpec, Dialect, DiffWarning, Entity, FieldDescriptor,
    MigrationDialect, TableModel, compare, diff_warnings, is_advisory,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExecutorOptions;
use crate::connection::DatabasePool;
use crate::error::{ReconcileError, Result};
use crate::introspect;
use crate::report::{ReportSink, TracingSink};

/// Infix between the table name and the timestamp of a backup table.
pub const BACKUP_INFIX: &str = "_backup_";

/// Timestamp format of backup table suffixes.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Changes for one table together with the statements implementing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub table: String,
    pub changes: Vec<ColumnChange>,
    /// Statements in execution order, advisories included.
    pub statements: Vec<String>,
    pub warnings: Vec<DiffWarning>,
}

impl ReconcilePlan {
    /// Returns `true` if the plan has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.statements.is_empty()
    }

    /// Statements that will actually be executed.
    pub fn executable(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .map(String::as_str)
            .filter(|s| !is_advisory(s))
    }

    /// Advisory statements that require operator action.
    pub fn advisories(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .map(String::as_str)
            .filter(|s| is_advisory(s))
    }

    /// Returns the operator-facing summary rows.
    #[must_use]
    pub fn summaries(&self) -> Vec<ChangeSummary> {
        self.changes.iter().map(ColumnChange::summary).collect()
    }
}

/// Outcome of one safe apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub table: String,
    pub changes: Vec<ColumnChange>,
    /// Every generated statement, advisories included.
    pub statements: Vec<String>,
    pub warnings: Vec<DiffWarning>,
    pub success: bool,
    /// Set when the statements were not executed.
    pub dry_run: bool,
    pub backup_table: Option<String>,
    pub failed_statement: Option<String>,
    pub recovery_instructions: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ReconciliationResult {
    fn start(plan: &ReconcilePlan) -> Self {
        Self {
            table: plan.table.clone(),
            changes: plan.changes.clone(),
            statements: plan.statements.clone(),
            warnings: plan.warnings.clone(),
            success: false,
            dry_run: false,
            backup_table: None,
            failed_statement: None,
            recovery_instructions: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Returns the operator-facing summary rows.
    #[must_use]
    pub fn summaries(&self) -> Vec<ChangeSummary> {
        self.changes.iter().map(ColumnChange::summary).collect()
    }
}

/// Reads, diffs and safely applies column changes.
pub struct SafeExecutor {
    pool: DatabasePool,
    options: ExecutorOptions,
    sink: Arc<dyn ReportSink>,
}

impl SafeExecutor {
    /// Creates an executor with default options reporting through
    /// [`TracingSink`].
    pub fn new(pool: impl Into<DatabasePool>) -> Self {
        Self {
            pool: pool.into(),
            options: ExecutorOptions::default(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces all options.
    #[must_use]
    pub const fn options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Enables dry-run mode (statements are returned but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    /// Enables or disables the pre-apply backup.
    #[must_use]
    pub const fn backup(mut self, enabled: bool) -> Self {
        self.options.backup = enabled;
        self
    }

    /// Sets the sink receiving every result.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the pool.
    #[must_use]
    pub const fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Returns the dialect of the pool.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Returns the active options.
    #[must_use]
    pub const fn current_options(&self) -> &ExecutorOptions {
        &self.options
    }

    fn strategy(&self) -> &'static dyn MigrationDialect {
        self.dialect().strategy()
    }

    /// Reads the live columns of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::TableNotFound`] if the table does not
    /// exist.
    pub async fn read_schema(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let columns = introspect::read_columns(&self.pool, table).await?;
        if columns.is_empty() {
            return Err(ReconcileError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    /// Compares live and desired columns in this pool's dialect.
    #[must_use]
    pub fn diff(&self, actual: &[ColumnSpec], desired: &[ColumnSpec]) -> Vec<ColumnChange> {
        compare(self.dialect(), actual, desired)
    }

    /// Diffs `actual` against `desired` and synthesizes the statements.
    #[must_use]
    pub fn plan(&self, table: &str, actual: &[ColumnSpec], desired: &[ColumnSpec]) -> ReconcilePlan {
        let changes = self.diff(actual, desired);
        let statements = self.strategy().synthesize(table, &changes);
        ReconcilePlan {
            table: table.to_string(),
            changes,
            statements,
            warnings: diff_warnings(actual, desired),
        }
    }

    /// Synthesizes and safely applies `changes` to `table`.
    pub async fn safe_apply(
        &self,
        table: &str,
        changes: Vec<ColumnChange>,
    ) -> Result<ReconciliationResult> {
        let statements = self.strategy().synthesize(table, &changes);
        let plan = ReconcilePlan {
            table: table.to_string(),
            changes,
            statements,
            warnings: Vec::new(),
        };
        self.apply_plan(&plan).await
    }

    /// Reconciles `table` with the declared `fields`.
    pub async fn reconcile(
        &self,
        table: &str,
        fields: &[FieldDescriptor],
    ) -> Result<ReconciliationResult> {
        let desired = oxide_reconcile_core::build(fields);
        let actual = self.read_schema(table).await?;
        let plan = self.plan(table, &actual, &desired);
        self.apply_plan(&plan).await
    }

    /// Reconciles the table described by a [`TableModel`].
    pub async fn reconcile_model(&self, model: &TableModel) -> Result<ReconciliationResult> {
        self.reconcile(&model.table, &model.fields).await
    }

    /// Reconciles the table of entity `E`.
    pub async fn reconcile_entity<E: Entity>(&self) -> Result<ReconciliationResult> {
        self.reconcile(E::TABLE, &E::fields()).await
    }

    /// Plans the explicit rebuild of `table` into the `desired` shape: a
    /// new table is created, the common columns are copied, the old table
    /// is dropped and the new one renamed.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Unsupported`] for dialects that alter
    /// columns in place.
    pub async fn plan_rebuild(&self, table: &str, desired: &[ColumnSpec]) -> Result<ReconcilePlan> {
        let actual = self.read_schema(table).await?;
        let mut plan = self.plan(table, &actual, desired);
        if plan.changes.is_empty() && plan.warnings.is_empty() {
            plan.statements.clear();
            return Ok(plan);
        }
        let strategy = self.strategy();
        plan.statements = strategy
            .rebuild_statements(table, &actual, desired)
            .ok_or_else(|| ReconcileError::Unsupported {
                dialect: strategy.name(),
                message: "table rebuilds; columns are altered in place".to_string(),
            })?;
        Ok(plan)
    }

    /// Rebuilds `table` into the `desired` shape through the same backup and
    /// transaction path as [`apply_plan`](Self::apply_plan).
    pub async fn rebuild_table(
        &self,
        table: &str,
        desired: &[ColumnSpec],
    ) -> Result<ReconciliationResult> {
        let plan = self.plan_rebuild(table, desired).await?;
        info!(table = %table, statements = plan.statements.len(), "Rebuilding table");
        self.apply_plan(&plan).await
    }

    /// Applies a plan.
    ///
    /// A failing statement is reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Backup`] if the backup could not be
    /// created, and [`ReconcileError::Database`] if no transaction could be
    /// opened.
    pub async fn apply_plan(&self, plan: &ReconcilePlan) -> Result<ReconciliationResult> {
        let started = Instant::now();
        let mut result = ReconciliationResult::start(plan);

        if plan.statements.is_empty() {
            result.success = true;
            return Ok(self.finish(result, started));
        }

        if self.options.dry_run {
            info!(table = %plan.table, "Dry run, statements will not be executed");
            for sql in &plan.statements {
                info!(sql = %sql, "Planned statement");
            }
            result.success = true;
            result.dry_run = true;
            return Ok(self.finish(result, started));
        }

        for advisory in plan.advisories() {
            warn!(comment = %advisory, "Skipping advisory statement");
        }
        if plan.executable().next().is_none() {
            result.success = true;
            return Ok(self.finish(result, started));
        }

        if self.options.backup {
            result.backup_table = Some(self.create_backup(&plan.table).await?);
        }

        info!(table = %plan.table, changes = plan.changes.len(), "Applying changes");
        let mut tx = self.pool.begin().await?;
        for sql in plan.executable() {
            debug!(sql = %sql, "Executing SQL");
            if let Err(e) = tx.execute(sql).await {
                warn!(table = %plan.table, sql = %sql, error = %e, "Statement failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(table = %plan.table, error = %rollback, "Rollback failed");
                }
                result.failed_statement = Some(sql.to_string());
                result.error = Some(e.to_string());
                result.recovery_instructions = result
                    .backup_table
                    .as_deref()
                    .map(|backup| self.strategy().recovery_instructions(&plan.table, backup));
                return Ok(self.finish(result, started));
            }
        }

        if let Err(e) = tx.commit().await {
            warn!(table = %plan.table, error = %e, "Commit failed");
            result.error = Some(e.to_string());
            result.recovery_instructions = result
                .backup_table
                .as_deref()
                .map(|backup| self.strategy().recovery_instructions(&plan.table, backup));
            return Ok(self.finish(result, started));
        }

        result.success = true;
        info!(table = %plan.table, "Changes committed");

        if let Some(retention) = self.options.retention() {
            match self.cleanup_backups(&plan.table, retention).await {
                Ok(dropped) if !dropped.is_empty() => {
                    info!(table = %plan.table, dropped = dropped.len(), "Dropped expired backups");
                }
                Ok(_) => {}
                Err(e) => warn!(table = %plan.table, error = %e, "Backup cleanup failed"),
            }
        }

        Ok(self.finish(result, started))
    }

    fn finish(&self, mut result: ReconciliationResult, started: Instant) -> ReconciliationResult {
        result.duration = started.elapsed();
        self.sink.report(&result);
        result
    }

    /// Copies `table` into a new timestamped backup table. A partially
    /// created backup is dropped again.
    async fn create_backup(&self, table: &str) -> Result<String> {
        let backup = self.next_backup_name(table).await?;
        info!(table = %table, backup = %backup, "Creating backup table");

        for sql in self.strategy().backup_statements(table, &backup) {
            debug!(sql = %sql, "Executing SQL");
            if let Err(source) = self.pool.execute(&sql).await {
                let drop = self.strategy().drop_table(&backup);
                if let Err(e) = self.pool.execute(&drop).await {
                    warn!(backup = %backup, error = %e, "Failed to drop partial backup");
                }
                return Err(ReconcileError::Backup {
                    table: table.to_string(),
                    backup,
                    source,
                });
            }
        }
        Ok(backup)
    }

    /// Returns a backup name not used yet. Several backups taken within
    /// the same second get a numeric suffix.
    async fn next_backup_name(&self, table: &str) -> Result<String> {
        let base = backup_table_name(table, Utc::now());
        let existing = introspect::list_tables(&self.pool).await?;
        let mut name = base.clone();
        let mut n = 1;
        while existing.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        Ok(name)
    }

    /// Drops backups of `table` older than `retention`. Returns the dropped
    /// table names. A failed drop is logged and skipped.
    pub async fn cleanup_backups(
        &self,
        table: &str,
        retention: chrono::Duration,
    ) -> Result<Vec<String>> {
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            debug!(table = %table, "Retention reaches past the earliest date, nothing expired");
            return Ok(Vec::new());
        };
        let mut dropped = Vec::new();

        for name in introspect::list_tables(&self.pool).await? {
            let Some(taken_at) = parse_backup_timestamp(table, &name) else {
                continue;
            };
            if taken_at >= cutoff {
                continue;
            }
            let sql = self.strategy().drop_table(&name);
            debug!(sql = %sql, "Executing SQL");
            match self.pool.execute(&sql).await {
                Ok(_) => {
                    info!(backup = %name, taken_at = %taken_at, "Dropped backup table");
                    dropped.push(name);
                }
                Err(e) => warn!(backup = %name, error = %e, "Failed to drop backup table"),
            }
        }
        Ok(dropped)
    }
}

/// Returns the backup table name for `table` taken at `at`.
#[must_use]
pub fn backup_table_name(table: &str, at: DateTime<Utc>) -> String {
    format!("{table}{BACKUP_INFIX}{}", at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Parses the timestamp out of a backup table name of `table`. Returns
/// `None` for any other table.
#[must_use]
pub fn parse_backup_timestamp(table: &str, name: &str) -> Option<DateTime<Utc>> {
    let suffix = name.strip_prefix(table)?.strip_prefix(BACKUP_INFIX)?;
    let (stamp, counter) = suffix.split_once('_').unwrap_or((suffix, "0"));
    if stamp.len() != 14 || !counter.bytes().all(|b| b.is_ascii_digit()) || counter.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

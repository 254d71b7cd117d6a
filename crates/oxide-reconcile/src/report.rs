//! Operator-facing reporting.
//!
//! The executor hands every finished [`ReconciliationResult`] to the
//! [`ReportSink`] it was built with. There is no process-wide reporter.

use tracing::{info, warn};

use crate::executor::ReconciliationResult;

/// Receives the outcome of each reconciliation.
pub trait ReportSink: Send + Sync {
    /// Called once per finished reconciliation, after the result is final.
    fn report(&self, result: &ReconciliationResult);
}

/// Emits one `info` event per change summary row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, result: &ReconciliationResult) {
        if result.changes.is_empty() {
            info!(table = %result.table, "Schema is up to date");
            return;
        }

        for change in &result.changes {
            let summary = change.summary();
            info!(
                table = %result.table,
                glyph = %summary.kind.glyph(),
                kind = %summary.kind,
                column = %summary.column,
                reason = %summary.reason,
                "{summary}"
            );
        }
        for warning in &result.warnings {
            warn!(table = %result.table, "{warning}");
        }

        if result.success {
            info!(
                table = %result.table,
                statements = result.statements.len(),
                backup = result.backup_table.as_deref().unwrap_or("none"),
                duration = ?result.duration,
                "Reconciliation finished"
            );
        } else {
            warn!(
                table = %result.table,
                failed_statement = result.failed_statement.as_deref().unwrap_or(""),
                error = result.error.as_deref().unwrap_or(""),
                "Reconciliation failed"
            );
            if let Some(instructions) = &result.recovery_instructions {
                warn!(table = %result.table, "{instructions}");
            }
        }
    }
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&self, _result: &ReconciliationResult) {}
}

//! Executor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options controlling how the safe executor applies a plan.
///
/// Loaded from a JSON file such as:
///
/// ```json
/// { "dry_run": false, "backup": true, "backup_retention_days": 7 }
/// ```
///
/// Missing keys take their [`Default`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Synthesize statements without executing them.
    pub dry_run: bool,
    /// Copy the table into a timestamped backup before applying.
    pub backup: bool,
    /// When set, backups of the reconciled table older than this many days
    /// are dropped after a successful apply.
    pub backup_retention_days: Option<u32>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            backup_retention_days: None,
        }
    }
}

impl ExecutorOptions {
    /// Reads options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Returns the backup retention window, if any.
    #[must_use]
    pub fn retention(&self) -> Option<chrono::Duration> {
        self.backup_retention_days
            .map(|days| chrono::Duration::days(i64::from(days)))
    }
}

//! Column-level schema differ.
//!
//! Compares the actual columns of a live table with the desired columns
//! built from code and produces the [`ColumnChange`]s needed to move from
//! one to the other. Both sides are normalized through the dialect before
//! comparison, so "equal" always means "renders to the same native column".

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::column::ColumnSpec;
use crate::dialect::Dialect;

/// Kind of column mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Column is declared but missing from the table.
    Add,
    /// Column exists on both sides with differing attributes.
    Modify,
    /// Column exists in the table but is no longer declared.
    Drop,
}

impl ChangeKind {
    /// Returns the glyph used in operator-facing summaries.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Add => '+',
            Self::Modify => '~',
            Self::Drop => '-',
        }
    }

    /// Returns the lowercase action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Drop => "drop",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compared column attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Type,
    Length,
    Precision,
    Scale,
    NotNull,
    Default,
    Comment,
}

impl Attribute {
    /// Returns `true` for attributes that change the column's storage type.
    #[must_use]
    pub const fn is_type_attribute(self) -> bool {
        matches!(
            self,
            Self::Type | Self::Length | Self::Precision | Self::Scale
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Length => "length",
            Self::Precision => "precision",
            Self::Scale => "scale",
            Self::NotNull => "not null",
            Self::Default => "default",
            Self::Comment => "comment",
        }
    }
}

/// One differing attribute with display forms of both values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub attribute: Attribute,
    pub before: String,
    pub after: String,
}

impl fmt::Display for AttributeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.attribute.as_str(),
            self.before,
            self.after
        )
    }
}

/// One required column mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    /// Column name.
    pub column: String,
    pub kind: ChangeKind,
    /// Live column, present for modify and drop.
    pub before: Option<ColumnSpec>,
    /// Desired column, present for add and modify.
    pub after: Option<ColumnSpec>,
    /// Differing attributes, populated for modify.
    pub differences: Vec<AttributeDiff>,
    /// Human-readable description of the change.
    pub reason: String,
}

impl ColumnChange {
    /// A column to add.
    #[must_use]
    pub fn add(after: ColumnSpec) -> Self {
        Self {
            column: after.name.clone(),
            kind: ChangeKind::Add,
            before: None,
            after: Some(after),
            differences: Vec::new(),
            reason: "new column".to_string(),
        }
    }

    /// A column to drop.
    #[must_use]
    pub fn drop(before: ColumnSpec) -> Self {
        Self {
            column: before.name.clone(),
            kind: ChangeKind::Drop,
            before: Some(before),
            after: None,
            differences: Vec::new(),
            reason: "column no longer declared".to_string(),
        }
    }

    /// A column to modify. The reason lists every differing attribute.
    #[must_use]
    pub fn modify(before: ColumnSpec, after: ColumnSpec, differences: Vec<AttributeDiff>) -> Self {
        let reason = differences
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            column: after.name.clone(),
            kind: ChangeKind::Modify,
            before: Some(before),
            after: Some(after),
            differences,
            reason,
        }
    }

    /// Returns `true` if `attribute` is among the differences.
    #[must_use]
    pub fn differs_in(&self, attribute: Attribute) -> bool {
        self.differences.iter().any(|d| d.attribute == attribute)
    }

    /// Returns the operator-facing summary row for this change.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            column: self.column.clone(),
            kind: self.kind,
            reason: self.reason.clone(),
        }
    }
}

/// Operator-facing summary row of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub column: String,
    pub kind: ChangeKind,
    pub reason: String,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<8} {}: {}",
            self.kind.glyph(),
            self.kind.as_str(),
            self.column,
            self.reason
        )
    }
}

/// Informational drift the differ never turns into statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffWarning {
    /// Primary key membership changed. Requires table recreation.
    PrimaryKeyChange { column: String, new_value: bool },
    /// Single-column UNIQUE constraint changed.
    UniqueChange { column: String, new_value: bool },
    /// Auto-increment changed. Most databases cannot alter this in place.
    AutoIncrementChange { column: String, new_value: bool },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKeyChange { column, new_value } => {
                write!(f, "{column}: primary key would become {new_value}")
            }
            Self::UniqueChange { column, new_value } => {
                write!(f, "{column}: unique would become {new_value}")
            }
            Self::AutoIncrementChange { column, new_value } => {
                write!(f, "{column}: auto-increment would become {new_value}")
            }
        }
    }
}

/// Compares the live columns of a table with the desired ones.
///
/// The result lists adds (in `desired` order), then drops (in `actual`
/// order), then modifies (in `desired` order). Renames show up as a drop
/// plus an add.
#[must_use]
pub fn compare(dialect: Dialect, actual: &[ColumnSpec], desired: &[ColumnSpec]) -> Vec<ColumnChange> {
    let actual_by_name: HashMap<&str, &ColumnSpec> =
        actual.iter().map(|c| (c.name.as_str(), c)).collect();
    let desired_by_name: HashMap<&str, &ColumnSpec> =
        desired.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut changes: Vec<ColumnChange> = desired
        .iter()
        .filter(|c| !actual_by_name.contains_key(c.name.as_str()))
        .map(|c| ColumnChange::add(c.clone()))
        .collect();

    changes.extend(
        actual
            .iter()
            .filter(|c| !desired_by_name.contains_key(c.name.as_str()))
            .map(|c| ColumnChange::drop(c.clone())),
    );

    for wanted in desired {
        let Some(live) = actual_by_name.get(wanted.name.as_str()) else {
            continue;
        };
        let differences = attribute_diffs(dialect, live, wanted);
        if !differences.is_empty() {
            changes.push(ColumnChange::modify(
                (*live).clone(),
                wanted.clone(),
                differences,
            ));
        }
    }

    changes
}

/// Lists the attributes that differ between a live and a desired column,
/// after normalizing both through `dialect`.
#[must_use]
pub fn attribute_diffs(dialect: Dialect, actual: &ColumnSpec, desired: &ColumnSpec) -> Vec<AttributeDiff> {
    let before = dialect.normalize(actual);
    let after = dialect.normalize(desired);
    let mut diffs = Vec::new();

    let mut push = |attribute, before: String, after: String| {
        diffs.push(AttributeDiff {
            attribute,
            before,
            after,
        });
    };

    if before.logical_type != after.logical_type {
        push(
            Attribute::Type,
            before.logical_type.to_string(),
            after.logical_type.to_string(),
        );
    }
    if before.length != after.length {
        push(
            Attribute::Length,
            display_opt(before.length),
            display_opt(after.length),
        );
    }
    if before.precision != after.precision {
        push(
            Attribute::Precision,
            display_opt(before.precision),
            display_opt(after.precision),
        );
    }
    if before.scale != after.scale {
        push(
            Attribute::Scale,
            display_opt(before.scale),
            display_opt(after.scale),
        );
    }
    if before.not_null != after.not_null {
        push(
            Attribute::NotNull,
            before.not_null.to_string(),
            after.not_null.to_string(),
        );
    }
    if !defaults_equal(before.default_value.as_deref(), after.default_value.as_deref()) {
        push(
            Attribute::Default,
            display_default(before.default_value.as_deref()),
            display_default(after.default_value.as_deref()),
        );
    }
    if before.comment != after.comment {
        push(
            Attribute::Comment,
            format!("{:?}", before.comment),
            format!("{:?}", after.comment),
        );
    }

    diffs
}

/// Reports primary key, unique and auto-increment drift on columns present
/// on both sides.
#[must_use]
pub fn diff_warnings(actual: &[ColumnSpec], desired: &[ColumnSpec]) -> Vec<DiffWarning> {
    let actual_by_name: HashMap<&str, &ColumnSpec> =
        actual.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut warnings = Vec::new();

    for wanted in desired {
        let Some(live) = actual_by_name.get(wanted.name.as_str()) else {
            continue;
        };
        if live.primary_key != wanted.primary_key {
            warnings.push(DiffWarning::PrimaryKeyChange {
                column: wanted.name.clone(),
                new_value: wanted.primary_key,
            });
        }
        // A primary key is already unique.
        if live.unique != wanted.unique && !wanted.primary_key {
            warnings.push(DiffWarning::UniqueChange {
                column: wanted.name.clone(),
                new_value: wanted.unique,
            });
        }
        if live.auto_increment != wanted.auto_increment {
            warnings.push(DiffWarning::AutoIncrementChange {
                column: wanted.name.clone(),
                new_value: wanted.auto_increment,
            });
        }
    }

    warnings
}

/// Default values are equal when their text matches or when both are
/// numbers of equal value (`0.00` vs `0`, `'42'` vs `42`).
fn defaults_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a == b {
                return true;
            }
            match (numeric_value(a), numeric_value(b)) {
                (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
                _ => false,
            }
        }
        _ => false,
    }
}

fn numeric_value(literal: &str) -> Option<f64> {
    let unquoted = literal
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(literal);
    unquoted.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn display_opt(value: Option<u32>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

fn display_default(value: Option<&str>) -> String {
    value.unwrap_or("NULL").to_string()
}

//! SQLite dialect.
//!
//! SQLite can only add columns in place. Modifying or dropping a column
//! produces an advisory comment instead of a statement; the table has to be
//! rebuilt through [`rebuild_statements`](MigrationDialect::rebuild_statements),
//! which is never invoked automatically.

use super::{ADVISORY_PREFIX, MigrationDialect, NativeType, TypeName};
use crate::column::{ColumnSpec, IndexKind, IndexSpec, LogicalType};
use crate::diff::{ChangeKind, ColumnChange};

/// SQLite dialect for schema reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Name of the scratch table used by the rebuild procedure.
    #[must_use]
    pub fn rebuild_table_name(table: &str) -> String {
        format!("{table}__rebuild")
    }

    fn advisory(&self, table: &str, action: &str, change: &ColumnChange) -> String {
        format!(
            "{ADVISORY_PREFIX} table {} requires full recreation to {action} column {} ({}); \
             run the table rebuild procedure",
            self.quote_identifier(table),
            self.quote_identifier(&change.column),
            change.reason
        )
    }

    fn add_statements(&self, table: &str, change: &ColumnChange, out: &mut Vec<String>) {
        let Some(column) = &change.after else {
            return;
        };
        if column.primary_key {
            out.push(self.advisory(table, "add primary key", change));
            return;
        }

        let mut definition = self.column_definition(column, false);
        if let Some(fk) = &column.foreign_key {
            definition.push_str(&self.references_clause(fk));
        }
        out.push(format!(
            "ALTER TABLE {} ADD COLUMN {definition}",
            self.quote_identifier(table)
        ));

        // ADD COLUMN cannot carry UNIQUE.
        let unique_requested = matches!(&column.index, Some(index) if index.kind == IndexKind::Unique);
        if column.unique && !unique_requested {
            let index = IndexSpec {
                kind: IndexKind::Unique,
                name: None,
            };
            out.push(self.create_index(table, &column.name, &index));
        }
        if let Some(index) = &column.index {
            out.push(self.create_index(table, &column.name, index));
        }
    }
}

/// SQLite's column affinity for a type name without a declared shape.
fn affinity(base: &str) -> LogicalType {
    if base.starts_with("date") || base.starts_with("time") || base == "json" {
        LogicalType::Text
    } else if base == "bool" || base == "boolean" || base.contains("int") {
        LogicalType::BigInt
    } else if base.contains("char") || base.contains("clob") || base.contains("text") {
        LogicalType::Text
    } else if base.is_empty() || base.contains("blob") {
        LogicalType::Binary
    } else if base.contains("real") || base.contains("floa") || base.contains("doub") {
        LogicalType::Double
    } else {
        LogicalType::Decimal
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    /// Keeps the declared length of character types and the precision of
    /// numeric types. Every other name falls back to SQLite's affinity
    /// rules, with date, time, json and boolean names mapped to the
    /// affinity they are rendered with.
    fn canonicalize(&self, native: &str) -> NativeType {
        let parsed = TypeName::parse(native);
        let declared = match parsed.base.as_str() {
            "varchar" | "character varying" | "varying character" | "nvarchar" => parsed
                .arg(0)
                .map(|n| NativeType::new(LogicalType::String).with_length(Some(n))),
            "char" | "character" | "nchar" | "native character" => parsed
                .arg(0)
                .map(|n| NativeType::new(LogicalType::FixedString).with_length(Some(n))),
            "numeric" | "decimal" => Some(
                NativeType::new(LogicalType::Decimal).with_precision(parsed.arg(0), parsed.arg(1)),
            ),
            _ => None,
        };
        declared.unwrap_or_else(|| NativeType::new(affinity(&parsed.base)))
    }

    fn render_type(&self, column: &ColumnSpec) -> String {
        match column.logical_type {
            LogicalType::SmallInt
            | LogicalType::Int
            | LogicalType::BigInt
            | LogicalType::Boolean => "INTEGER".to_string(),
            LogicalType::Float | LogicalType::Double => "REAL".to_string(),
            LogicalType::Decimal => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("NUMERIC({p},{s})"),
                (Some(p), None) => format!("NUMERIC({p})"),
                _ => "NUMERIC".to_string(),
            },
            LogicalType::String => column
                .length
                .map_or_else(|| "TEXT".to_string(), |n| format!("VARCHAR({n})")),
            LogicalType::FixedString => column
                .length
                .map_or_else(|| "TEXT".to_string(), |n| format!("CHAR({n})")),
            LogicalType::Text
            | LogicalType::LongText
            | LogicalType::Date
            | LogicalType::Datetime
            | LogicalType::Timestamp
            | LogicalType::Time
            | LogicalType::Json => "TEXT".to_string(),
            LogicalType::Binary => "BLOB".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        " AUTOINCREMENT".to_string()
    }

    fn supports_comments(&self) -> bool {
        false
    }

    fn synthesize(&self, table: &str, changes: &[ColumnChange]) -> Vec<String> {
        let mut out = Vec::new();
        for change in changes {
            match change.kind {
                ChangeKind::Add => self.add_statements(table, change, &mut out),
                ChangeKind::Modify => out.push(self.advisory(table, "modify", change)),
                ChangeKind::Drop => out.push(self.advisory(table, "drop", change)),
            }
        }
        out
    }

    fn backup_statements(&self, table: &str, backup: &str) -> Vec<String> {
        vec![format!(
            "CREATE TABLE {} AS SELECT * FROM {}",
            self.quote_identifier(backup),
            self.quote_identifier(table)
        )]
    }

    fn rebuild_statements(
        &self,
        table: &str,
        actual: &[ColumnSpec],
        desired: &[ColumnSpec],
    ) -> Option<Vec<String>> {
        let scratch = Self::rebuild_table_name(table);
        let key_columns: Vec<&str> = desired
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect();
        let composite_key = key_columns.len() > 1;

        let mut definitions: Vec<String> = desired
            .iter()
            .map(|column| {
                let mut column_def = column.clone();
                if composite_key {
                    column_def.primary_key = false;
                }
                // AUTOINCREMENT is only valid on an INTEGER PRIMARY KEY.
                column_def.auto_increment = column.auto_increment && column_def.primary_key;
                let mut definition = self.column_definition(&column_def, true);
                if let Some(fk) = &column.foreign_key {
                    definition.push_str(&self.references_clause(fk));
                }
                format!("    {definition}")
            })
            .collect();
        if composite_key {
            let keys: Vec<String> = key_columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            definitions.push(format!("    PRIMARY KEY ({})", keys.join(", ")));
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(&scratch),
            definitions.join(",\n")
        )];

        // Generated columns compute their own values.
        let copied: Vec<String> = desired
            .iter()
            .filter(|c| c.generated.is_none())
            .filter(|c| {
                actual
                    .iter()
                    .any(|a| a.name == c.name && a.generated.is_none())
            })
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        if !copied.is_empty() {
            let columns = copied.join(", ");
            statements.push(format!(
                "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
                self.quote_identifier(&scratch),
                self.quote_identifier(table)
            ));
        }

        statements.push(format!("DROP TABLE {}", self.quote_identifier(table)));
        statements.push(self.rename_table(&scratch, table));
        statements.extend(
            desired
                .iter()
                .filter_map(|c| c.index.as_ref().map(|index| self.create_index(table, &c.name, index))),
        );

        Some(statements)
    }
}

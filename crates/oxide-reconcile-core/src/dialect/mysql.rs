//! MySQL dialect.
//!
//! MySQL accepts any number of comma-separated `ADD`/`MODIFY`/`DROP`
//! clauses in one `ALTER TABLE`, so a change set becomes one statement.

use super::{MigrationDialect, NativeType, TypeName};
use crate::column::{ColumnSpec, IndexKind, LogicalType};
use crate::diff::{ChangeKind, ColumnChange};
use crate::model::{DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE};

/// Default `VARCHAR` length when none is declared.
const DEFAULT_VARCHAR_LENGTH: u32 = 255;

/// MySQL dialect for schema reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn add_clauses(&self, table: &str, column: &ColumnSpec) -> Vec<String> {
        let mut clauses = vec![format!(
            "ADD COLUMN {}",
            self.column_definition(column, true)
        )];

        if let Some(index) = &column.index {
            let unique = match index.kind {
                IndexKind::Unique => "UNIQUE ",
                IndexKind::Index => "",
            };
            clauses.push(format!(
                "ADD {unique}INDEX {} ({})",
                self.quote_identifier(&index.name_for(table, &column.name)),
                self.quote_identifier(&column.name)
            ));
        }

        if let Some(fk) = &column.foreign_key {
            clauses.push(format!(
                "ADD CONSTRAINT {} FOREIGN KEY ({}){}",
                self.quote_identifier(&format!("fk_{table}_{}", column.name)),
                self.quote_identifier(&column.name),
                self.references_clause(fk)
            ));
        }

        clauses
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn canonicalize(&self, native: &str) -> NativeType {
        let parsed = TypeName::parse(native);
        // `int unsigned`, `bigint(20) unsigned zerofill`
        let base = parsed.base.split_whitespace().next().unwrap_or_default();
        match base {
            "varchar" => NativeType::new(LogicalType::String).with_length(parsed.arg(0)),
            "char" => NativeType::new(LogicalType::FixedString)
                .with_length(Some(parsed.arg(0).unwrap_or(1))),
            "tinytext" | "text" | "mediumtext" => NativeType::new(LogicalType::Text),
            "longtext" => NativeType::new(LogicalType::LongText),
            "tinyint" if parsed.arg(0) == Some(1) => NativeType::new(LogicalType::Boolean),
            "bool" | "boolean" => NativeType::new(LogicalType::Boolean),
            "tinyint" | "smallint" | "year" => NativeType::new(LogicalType::SmallInt),
            "mediumint" | "int" | "integer" => NativeType::new(LogicalType::Int),
            "bigint" | "serial" => NativeType::new(LogicalType::BigInt),
            "float" => NativeType::new(LogicalType::Float),
            "double" | "real" => NativeType::new(LogicalType::Double),
            "decimal" | "numeric" | "dec" | "fixed" => NativeType::new(LogicalType::Decimal)
                .with_precision(
                    Some(parsed.arg(0).unwrap_or(DEFAULT_DECIMAL_PRECISION)),
                    Some(parsed.arg(1).unwrap_or(0)),
                ),
            "date" => NativeType::new(LogicalType::Date),
            "datetime" => NativeType::new(LogicalType::Datetime),
            "timestamp" => NativeType::new(LogicalType::Timestamp),
            "time" => NativeType::new(LogicalType::Time),
            "binary" | "varbinary" => {
                NativeType::new(LogicalType::Binary).with_length(parsed.arg(0))
            }
            "tinyblob" | "blob" | "mediumblob" | "longblob" => NativeType::new(LogicalType::Binary),
            "json" => NativeType::new(LogicalType::Json),
            "enum" | "set" => {
                NativeType::new(LogicalType::String).with_length(Some(DEFAULT_VARCHAR_LENGTH))
            }
            _ => NativeType::new(LogicalType::Text),
        }
    }

    fn render_type(&self, column: &ColumnSpec) -> String {
        match column.logical_type {
            LogicalType::String => format!(
                "VARCHAR({})",
                column.length.unwrap_or(DEFAULT_VARCHAR_LENGTH)
            ),
            LogicalType::FixedString => format!("CHAR({})", column.length.unwrap_or(1)),
            LogicalType::Text => "TEXT".to_string(),
            LogicalType::LongText => "LONGTEXT".to_string(),
            LogicalType::SmallInt => "SMALLINT".to_string(),
            LogicalType::Int => "INT".to_string(),
            LogicalType::BigInt => "BIGINT".to_string(),
            LogicalType::Float => "FLOAT".to_string(),
            LogicalType::Double => "DOUBLE".to_string(),
            LogicalType::Decimal => format!(
                "DECIMAL({},{})",
                column.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                column.scale.unwrap_or(DEFAULT_DECIMAL_SCALE)
            ),
            LogicalType::Boolean => "TINYINT(1)".to_string(),
            LogicalType::Date => "DATE".to_string(),
            LogicalType::Datetime => "DATETIME".to_string(),
            LogicalType::Timestamp => "TIMESTAMP".to_string(),
            LogicalType::Time => "TIME".to_string(),
            LogicalType::Binary => column
                .length
                .map_or_else(|| "BLOB".to_string(), |n| format!("VARBINARY({n})")),
            LogicalType::Json => "JSON".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        " AUTO_INCREMENT".to_string()
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn supports_inline_comment(&self) -> bool {
        true
    }

    fn synthesize(&self, table: &str, changes: &[ColumnChange]) -> Vec<String> {
        let mut clauses = Vec::new();
        for change in changes {
            match (change.kind, &change.after) {
                (ChangeKind::Add, Some(after)) => clauses.extend(self.add_clauses(table, after)),
                (ChangeKind::Modify, Some(after)) => clauses.push(format!(
                    "MODIFY COLUMN {}",
                    self.column_definition(after, false)
                )),
                (ChangeKind::Drop, _) => clauses.push(format!(
                    "DROP COLUMN {}",
                    self.quote_identifier(&change.column)
                )),
                (ChangeKind::Add | ChangeKind::Modify, None) => {}
            }
        }

        if clauses.is_empty() {
            return Vec::new();
        }
        vec![format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        )]
    }

    fn backup_statements(&self, table: &str, backup: &str) -> Vec<String> {
        let table = self.quote_identifier(table);
        let backup = self.quote_identifier(backup);
        vec![
            format!("CREATE TABLE {backup} LIKE {table}"),
            format!("INSERT INTO {backup} SELECT * FROM {table}"),
        ]
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }
}

//! PostgreSQL dialect.
//!
//! PostgreSQL changes one column attribute per `ALTER COLUMN` clause, so a
//! single modify expands into one statement per differing attribute.

use super::{MigrationDialect, NativeType, TypeName};
use crate::column::{ColumnSpec, LogicalType, quote_literal};
use crate::diff::{Attribute, ChangeKind, ColumnChange};
use crate::model::{DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE};

/// PostgreSQL dialect for schema reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn comment_on(&self, table: &str, column: &ColumnSpec) -> String {
        let comment = if column.comment.is_empty() {
            "NULL".to_string()
        } else {
            quote_literal(&column.comment)
        };
        format!(
            "COMMENT ON COLUMN {}.{} IS {comment}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name)
        )
    }

    fn add_statements(&self, table: &str, column: &ColumnSpec, out: &mut Vec<String>) {
        let mut definition = self.column_definition(column, true);
        if let Some(fk) = &column.foreign_key {
            definition.push_str(&self.references_clause(fk));
        }
        out.push(format!(
            "ALTER TABLE {} ADD COLUMN {definition}",
            self.quote_identifier(table)
        ));
        if let Some(index) = &column.index {
            out.push(self.create_index(table, &column.name, index));
        }
        if !column.comment.is_empty() {
            out.push(self.comment_on(table, column));
        }
    }

    fn modify_statements(&self, table: &str, change: &ColumnChange, out: &mut Vec<String>) {
        let Some(after) = &change.after else {
            return;
        };
        let alter = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(&after.name)
        );

        let retype = change
            .differences
            .iter()
            .any(|d| d.attribute.is_type_attribute());
        let redefault = change.differs_in(Attribute::Default);
        let had_default = change
            .before
            .as_ref()
            .is_some_and(|before| before.default_value.is_some());

        // The old default may not cast to the new type.
        let drop_default_first = retype && redefault && had_default;
        if drop_default_first {
            out.push(format!("{alter} DROP DEFAULT"));
        }
        if retype {
            let native = self.render_type(after);
            if change.differs_in(Attribute::Type) {
                out.push(format!(
                    "{alter} TYPE {native} USING {}::{native}",
                    self.quote_identifier(&after.name)
                ));
            } else {
                out.push(format!("{alter} TYPE {native}"));
            }
        }
        if change.differs_in(Attribute::NotNull) {
            if after.not_null {
                out.push(format!("{alter} SET NOT NULL"));
            } else {
                out.push(format!("{alter} DROP NOT NULL"));
            }
        }
        if redefault {
            match self.render_default(after) {
                Some(default) => out.push(format!("{alter} SET DEFAULT {default}")),
                None if !drop_default_first => out.push(format!("{alter} DROP DEFAULT")),
                None => {}
            }
        }
        if change.differs_in(Attribute::Comment) {
            out.push(self.comment_on(table, after));
        }
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn canonicalize(&self, native: &str) -> NativeType {
        let parsed = TypeName::parse(native);
        let with_zone = |s: &str| s.contains("with time zone") && !s.contains("without");
        match parsed.base.as_str() {
            "character varying" | "varchar" => {
                NativeType::new(LogicalType::String).with_length(parsed.arg(0))
            }
            "character" | "char" | "bpchar" => NativeType::new(LogicalType::FixedString)
                .with_length(Some(parsed.arg(0).unwrap_or(1))),
            "uuid" => NativeType::new(LogicalType::FixedString).with_length(Some(36)),
            "text" | "citext" => NativeType::new(LogicalType::Text),
            "smallint" | "int2" | "smallserial" => NativeType::new(LogicalType::SmallInt),
            "integer" | "int" | "int4" | "serial" => NativeType::new(LogicalType::Int),
            "bigint" | "int8" | "bigserial" => NativeType::new(LogicalType::BigInt),
            "real" | "float4" => NativeType::new(LogicalType::Float),
            "double precision" | "float8" => NativeType::new(LogicalType::Double),
            "numeric" | "decimal" => NativeType::new(LogicalType::Decimal)
                .with_precision(parsed.arg(0), parsed.arg(0).map(|_| parsed.arg(1).unwrap_or(0))),
            "boolean" | "bool" => NativeType::new(LogicalType::Boolean),
            "date" => NativeType::new(LogicalType::Date),
            "timestamptz" => NativeType::new(LogicalType::Timestamp),
            base if base.starts_with("timestamp") => {
                if with_zone(base) || with_zone(&parsed.suffix) {
                    NativeType::new(LogicalType::Timestamp)
                } else {
                    NativeType::new(LogicalType::Datetime)
                }
            }
            base if base.starts_with("time") => NativeType::new(LogicalType::Time),
            "bytea" => NativeType::new(LogicalType::Binary),
            "json" | "jsonb" => NativeType::new(LogicalType::Json),
            _ => NativeType::new(LogicalType::Text),
        }
    }

    fn render_type(&self, column: &ColumnSpec) -> String {
        match column.logical_type {
            LogicalType::String => column
                .length
                .map_or_else(|| "VARCHAR".to_string(), |n| format!("VARCHAR({n})")),
            LogicalType::FixedString => format!("CHAR({})", column.length.unwrap_or(1)),
            LogicalType::Text | LogicalType::LongText => "TEXT".to_string(),
            LogicalType::SmallInt => "SMALLINT".to_string(),
            LogicalType::Int => "INTEGER".to_string(),
            LogicalType::BigInt => "BIGINT".to_string(),
            LogicalType::Float => "REAL".to_string(),
            LogicalType::Double => "DOUBLE PRECISION".to_string(),
            LogicalType::Decimal => format!(
                "NUMERIC({},{})",
                column.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                column.scale.unwrap_or(DEFAULT_DECIMAL_SCALE)
            ),
            LogicalType::Boolean => "BOOLEAN".to_string(),
            LogicalType::Date => "DATE".to_string(),
            LogicalType::Datetime => "TIMESTAMP".to_string(),
            LogicalType::Timestamp => "TIMESTAMPTZ".to_string(),
            LogicalType::Time => "TIME".to_string(),
            LogicalType::Binary => "BYTEA".to_string(),
            LogicalType::Json => "JSONB".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        " GENERATED BY DEFAULT AS IDENTITY".to_string()
    }

    fn render_default(&self, column: &ColumnSpec) -> Option<String> {
        let default = column.default_value.as_deref()?;
        if column.logical_type == LogicalType::Boolean {
            match default {
                "1" => return Some("TRUE".to_string()),
                "0" => return Some("FALSE".to_string()),
                _ => {}
            }
        }
        Some(default.to_string())
    }

    fn synthesize(&self, table: &str, changes: &[ColumnChange]) -> Vec<String> {
        let mut out = Vec::new();
        for change in changes {
            match change.kind {
                ChangeKind::Add => {
                    if let Some(after) = &change.after {
                        self.add_statements(table, after, &mut out);
                    }
                }
                ChangeKind::Modify => self.modify_statements(table, change, &mut out),
                ChangeKind::Drop => out.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.quote_identifier(table),
                    self.quote_identifier(&change.column)
                )),
            }
        }
        out
    }

    fn backup_statements(&self, table: &str, backup: &str) -> Vec<String> {
        let table = self.quote_identifier(table);
        let backup = self.quote_identifier(backup);
        // Identity and generation are left out so that `SELECT *` can be
        // inserted verbatim.
        vec![
            format!(
                "CREATE TABLE {backup} (LIKE {table} INCLUDING DEFAULTS INCLUDING CONSTRAINTS \
                 INCLUDING INDEXES INCLUDING COMMENTS)"
            ),
            format!("INSERT INTO {backup} SELECT * FROM {table}"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ForeignKeySpec, IndexKind, IndexSpec};
    use crate::diff::compare;
    use crate::dialect::Dialect;

    #[test]
    fn test_modify_expands_per_attribute() {
        let actual = vec![ColumnSpec::new("status", LogicalType::String).length(10)];
        let desired = vec![
            ColumnSpec::new("status", LogicalType::String)
                .length(20)
                .not_null()
                .default_value("'active'"),
        ];
        let changes = compare(Dialect::Postgres, &actual, &desired);
        let statements = PostgresDialect.synthesize("t", &changes);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"t\" ALTER COLUMN \"status\" TYPE VARCHAR(20)",
                "ALTER TABLE \"t\" ALTER COLUMN \"status\" SET NOT NULL",
                "ALTER TABLE \"t\" ALTER COLUMN \"status\" SET DEFAULT 'active'",
            ]
        );
    }

    #[test]
    fn test_type_change_uses_cast() {
        let actual = vec![ColumnSpec::new("age", LogicalType::Text).default_value("'1'")];
        let desired = vec![ColumnSpec::new("age", LogicalType::Int)];
        let changes = compare(Dialect::Postgres, &actual, &desired);
        let statements = PostgresDialect.synthesize("people", &changes);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"people\" ALTER COLUMN \"age\" DROP DEFAULT",
                "ALTER TABLE \"people\" ALTER COLUMN \"age\" TYPE INTEGER USING \"age\"::INTEGER",
            ]
        );
    }

    #[test]
    fn test_add_with_reference_index_and_comment() {
        let column = ColumnSpec::new("author_id", LogicalType::BigInt)
            .comment("post author")
            .index(IndexSpec {
                kind: IndexKind::Unique,
                name: None,
            })
            .foreign_key(ForeignKeySpec::parse_target("users.id").unwrap());
        let statements = PostgresDialect.synthesize("posts", &[ColumnChange::add(column)]);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"posts\" ADD COLUMN \"author_id\" BIGINT REFERENCES \"users\" (\"id\")",
                "CREATE UNIQUE INDEX \"uniq_posts_author_id\" ON \"posts\" (\"author_id\")",
                "COMMENT ON COLUMN \"posts\".\"author_id\" IS 'post author'",
            ]
        );
    }

    #[test]
    fn test_drop_statement() {
        let change = ColumnChange::drop(ColumnSpec::new("legacy", LogicalType::Text));
        assert_eq!(
            PostgresDialect.synthesize("t", &[change]),
            vec!["ALTER TABLE \"t\" DROP COLUMN \"legacy\""]
        );
    }

    #[test]
    fn test_comment_removal() {
        let actual = vec![ColumnSpec::new("n", LogicalType::Int).comment("old")];
        let desired = vec![ColumnSpec::new("n", LogicalType::Int)];
        let changes = compare(Dialect::Postgres, &actual, &desired);
        assert_eq!(
            PostgresDialect.synthesize("t", &changes),
            vec!["COMMENT ON COLUMN \"t\".\"n\" IS NULL"]
        );
    }

    #[test]
    fn test_boolean_default_rendering() {
        let column = ColumnSpec::new("active", LogicalType::Boolean)
            .not_null()
            .default_value("1");
        assert_eq!(
            PostgresDialect.column_definition(&column, true),
            "\"active\" BOOLEAN NOT NULL DEFAULT TRUE"
        );
    }

    #[test]
    fn test_identity_column_definition() {
        let column = ColumnSpec::new("id", LogicalType::BigInt)
            .primary_key()
            .auto_increment();
        assert_eq!(
            PostgresDialect.column_definition(&column, true),
            "\"id\" BIGINT NOT NULL PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY"
        );
    }

    #[test]
    fn test_canonicalize_format_type_output() {
        let d = PostgresDialect;
        let t = d.canonicalize("character varying(120)");
        assert_eq!((t.logical, t.length), (LogicalType::String, Some(120)));
        assert_eq!(
            d.canonicalize("timestamp(6) without time zone").logical,
            LogicalType::Datetime
        );
        assert_eq!(
            d.canonicalize("timestamp with time zone").logical,
            LogicalType::Timestamp
        );
        assert_eq!(
            d.canonicalize("time without time zone").logical,
            LogicalType::Time
        );
        assert_eq!(d.canonicalize("double precision").logical, LogicalType::Double);
        let n = d.canonicalize("numeric(10,2)");
        assert_eq!((n.precision, n.scale), (Some(10), Some(2)));
        let n = d.canonicalize("numeric");
        assert_eq!((n.precision, n.scale), (None, None));
        assert_eq!(d.canonicalize("jsonb").logical, LogicalType::Json);
        assert_eq!(d.canonicalize("uuid").length, Some(36));
        assert_eq!(d.canonicalize("tsvector").logical, LogicalType::Text);
    }

    #[test]
    fn test_unbounded_varchar_differs_from_declared_length() {
        let d = PostgresDialect;
        assert_eq!(d.render_type(&ColumnSpec::new("s", LogicalType::String)), "VARCHAR");
        assert_eq!(d.canonicalize("character varying").length, None);

        let actual = vec![ColumnSpec::new("s", LogicalType::String)];
        let desired = vec![ColumnSpec::new("s", LogicalType::String).length(255)];
        let changes = compare(Dialect::Postgres, &actual, &desired);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].differs_in(Attribute::Length));
        assert_eq!(
            d.synthesize("t", &changes),
            vec!["ALTER TABLE \"t\" ALTER COLUMN \"s\" TYPE VARCHAR(255)"]
        );
    }

    #[test]
    fn test_long_text_collapses_to_text() {
        let long = PostgresDialect.normalize(&ColumnSpec::new("body", LogicalType::LongText));
        assert_eq!(long.logical_type, LogicalType::Text);
    }

    #[test]
    fn test_backup_statements() {
        let statements = PostgresDialect.backup_statements("users", "users_backup_1");
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE \"users_backup_1\" (LIKE \"users\""));
        assert_eq!(
            statements[1],
            "INSERT INTO \"users_backup_1\" SELECT * FROM \"users\""
        );
    }
}

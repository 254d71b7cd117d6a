//! Live schema readers.
//!
//! One reader per driver turns the catalog's view of a table into
//! [`ColumnSpec`]s using the same vocabulary as the declarative side. A
//! table that does not exist reads as an empty column list.

mod mysql;
mod postgres;
mod sqlite;

use oxide_reconcile_core::{ColumnSpec, ForeignKeyAction, MigrationDialect, quote_literal};

use crate::connection::DatabasePool;
use crate::error::Result;

/// Reads the live columns of `table` in ordinal order.
///
/// Query failures are returned as the raw driver error.
pub async fn read_columns(pool: &DatabasePool, table: &str) -> Result<Vec<ColumnSpec>> {
    match pool {
        DatabasePool::Sqlite(pool) => sqlite::read_columns(pool, table).await,
        DatabasePool::Postgres(pool) => postgres::read_columns(pool, table).await,
        DatabasePool::MySql(pool) => mysql::read_columns(pool, table).await,
    }
}

/// Lists the base tables of the current database or schema.
pub async fn list_tables(pool: &DatabasePool) -> Result<Vec<String>> {
    match pool {
        DatabasePool::Sqlite(pool) => sqlite::list_tables(pool).await,
        DatabasePool::Postgres(pool) => postgres::list_tables(pool).await,
        DatabasePool::MySql(pool) => mysql::list_tables(pool).await,
    }
}

/// Returns `true` if `table` exists.
pub async fn table_exists(pool: &DatabasePool, table: &str) -> Result<bool> {
    Ok(list_tables(pool).await?.iter().any(|t| t == table))
}

/// Starts a column from its catalog type name.
fn column_from_native(
    dialect: &dyn MigrationDialect,
    name: impl Into<String>,
    native: &str,
) -> ColumnSpec {
    let parsed = dialect.canonicalize(native);
    let mut column = ColumnSpec::new(name, parsed.logical);
    column.length = parsed.length;
    column.precision = parsed.precision;
    column.scale = parsed.scale;
    column
}

/// Parses a referential action as spelled by the catalogs. `NO ACTION` is
/// the implicit default and reads as `None`.
fn parse_fk_action(action: &str) -> Option<ForeignKeyAction> {
    match action.trim().to_ascii_uppercase().as_str() {
        "CASCADE" => Some(ForeignKeyAction::Cascade),
        "RESTRICT" => Some(ForeignKeyAction::Restrict),
        "SET NULL" => Some(ForeignKeyAction::SetNull),
        "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
        _ => None,
    }
}

/// Drops the quotes around a numeric literal (`'-1'` to `-1`) on numeric
/// columns, matching how the model builder writes numbers.
fn unquote_numeric(column: &ColumnSpec, value: String) -> String {
    if !column.logical_type.is_numeric() {
        return value;
    }
    let inner = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''));
    match inner {
        Some(number) if number.parse::<f64>().is_ok_and(f64::is_finite) => number.to_string(),
        _ => value,
    }
}

/// Quotes a bare string default unless it is a number.
fn quote_bare_default(value: &str) -> String {
    let is_number = value.parse::<f64>().is_ok_and(f64::is_finite);
    if value.starts_with('\'') || is_number {
        value.to_string()
    } else {
        quote_literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_reconcile_core::LogicalType;

    #[test]
    fn test_parse_fk_action() {
        assert_eq!(parse_fk_action("CASCADE"), Some(ForeignKeyAction::Cascade));
        assert_eq!(parse_fk_action("set null"), Some(ForeignKeyAction::SetNull));
        assert_eq!(parse_fk_action("NO ACTION"), None);
    }

    #[test]
    fn test_unquote_numeric() {
        let int = ColumnSpec::new("n", LogicalType::Int);
        assert_eq!(unquote_numeric(&int, "'-1'".into()), "-1");
        assert_eq!(unquote_numeric(&int, "'x'".into()), "'x'");

        let text = ColumnSpec::new("s", LogicalType::Text);
        assert_eq!(unquote_numeric(&text, "'1'".into()), "'1'");
    }

    #[test]
    fn test_quote_bare_default() {
        assert_eq!(quote_bare_default("active"), "'active'");
        assert_eq!(quote_bare_default("'active'"), "'active'");
        assert_eq!(quote_bare_default("it's"), "'it''s'");
        assert_eq!(quote_bare_default("42"), "42");
    }
}

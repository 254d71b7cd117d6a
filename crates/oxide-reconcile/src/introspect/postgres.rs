//! PostgreSQL reader built on `pg_catalog`.
//!
//! Only the current schema is considered. Every text column is cast to
//! `text` so that `name` and `"char"` columns decode as `String`.

use oxide_reconcile_core::{
    ColumnSpec, ForeignKeySpec, GeneratedMode, GeneratedSpec, IndexKind, IndexSpec,
    PostgresDialect, canonical_default,
};
use sqlx::Row;
use sqlx::postgres::PgPool;
use tracing::debug;

use super::{column_from_native, parse_fk_action, unquote_numeric};
use crate::error::Result;

const COLUMNS_QUERY: &str = r"
SELECT a.attname::text AS column_name,
       format_type(a.atttypid, a.atttypmod)::text AS data_type,
       a.attnotnull AS not_null,
       pg_get_expr(d.adbin, d.adrelid)::text AS default_expr,
       col_description(c.oid, a.attnum)::text AS comment,
       a.attidentity::text AS identity,
       a.attgenerated::text AS generated
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE c.relname = $1
  AND n.nspname = current_schema()
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
";

const KEYS_QUERY: &str = r"
SELECT con.contype::text AS kind,
       a.attname::text AS column_name,
       array_length(con.conkey, 1) AS key_count
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY(con.conkey)
WHERE c.relname = $1
  AND n.nspname = current_schema()
  AND con.contype IN ('p', 'u')
";

const FOREIGN_KEYS_QUERY: &str = r"
SELECT a.attname::text AS column_name,
       rc.relname::text AS ref_table,
       ra.attname::text AS ref_column,
       con.confdeltype::text AS on_delete,
       con.confupdtype::text AS on_update
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_class rc ON rc.oid = con.confrelid
JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = con.conkey[1]
JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = con.confkey[1]
WHERE c.relname = $1
  AND n.nspname = current_schema()
  AND con.contype = 'f'
  AND array_length(con.conkey, 1) = 1
";

/// Single-column indexes not backing a constraint.
const INDEXES_QUERY: &str = r"
SELECT i.relname::text AS index_name,
       a.attname::text AS column_name,
       ix.indisunique AS is_unique
FROM pg_index ix
JOIN pg_class t ON t.oid = ix.indrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ix.indkey[0]
WHERE t.relname = $1
  AND n.nspname = current_schema()
  AND ix.indnatts = 1
  AND NOT ix.indisprimary
  AND NOT EXISTS (SELECT 1 FROM pg_constraint con WHERE con.conindid = ix.indexrelid)
";

pub(super) async fn read_columns(pool: &PgPool, table: &str) -> Result<Vec<ColumnSpec>> {
    let rows = sqlx::query(COLUMNS_QUERY).bind(table).fetch_all(pool).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;
        let default_expr: Option<String> = row.try_get("default_expr")?;
        let identity: Option<String> = row.try_get("identity")?;
        let generated: Option<String> = row.try_get("generated")?;

        let mut column = column_from_native(&PostgresDialect, name, &data_type);
        column.not_null = row.try_get("not_null")?;
        column.comment = row
            .try_get::<Option<String>, _>("comment")?
            .unwrap_or_default();

        let is_identity = identity.is_some_and(|i| !i.is_empty());
        let is_generated = generated.is_some_and(|g| !g.is_empty());
        let is_sequence = default_expr
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("));
        column.auto_increment = is_identity || is_sequence;

        if is_generated {
            // PostgreSQL only has stored generated columns.
            column.generated = Some(GeneratedSpec {
                expression: default_expr.unwrap_or_default(),
                mode: GeneratedMode::Stored,
            });
        } else if !is_sequence {
            column.default_value = default_expr
                .as_deref()
                .and_then(normalize_default)
                .map(|value| unquote_numeric(&column, value));
        }

        columns.push(column);
    }

    if columns.is_empty() {
        return Ok(columns);
    }

    read_keys(pool, table, &mut columns).await?;
    read_foreign_keys(pool, table, &mut columns).await?;
    read_indexes(pool, table, &mut columns).await?;

    debug!(table = %table, columns = columns.len(), "Read PostgreSQL table");
    Ok(columns)
}

async fn read_keys(pool: &PgPool, table: &str, columns: &mut [ColumnSpec]) -> Result<()> {
    let rows = sqlx::query(KEYS_QUERY).bind(table).fetch_all(pool).await?;
    for row in rows {
        let kind: String = row.try_get("kind")?;
        let column_name: String = row.try_get("column_name")?;
        let key_count: Option<i32> = row.try_get("key_count")?;
        let Some(column) = columns.iter_mut().find(|c| c.name == column_name) else {
            continue;
        };
        match kind.as_str() {
            "p" => {
                column.primary_key = true;
                column.not_null = true;
            }
            "u" if key_count == Some(1) => column.unique = true,
            _ => {}
        }
    }
    Ok(())
}

async fn read_foreign_keys(pool: &PgPool, table: &str, columns: &mut [ColumnSpec]) -> Result<()> {
    let rows = sqlx::query(FOREIGN_KEYS_QUERY)
        .bind(table)
        .fetch_all(pool)
        .await?;
    for row in rows {
        let column_name: String = row.try_get("column_name")?;
        let on_delete: String = row.try_get("on_delete")?;
        let on_update: String = row.try_get("on_update")?;
        if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
            column.foreign_key = Some(ForeignKeySpec {
                table: row.try_get("ref_table")?,
                column: row.try_get("ref_column")?,
                on_delete: parse_fk_action(action_name(&on_delete)),
                on_update: parse_fk_action(action_name(&on_update)),
            });
        }
    }
    Ok(())
}

async fn read_indexes(pool: &PgPool, table: &str, columns: &mut [ColumnSpec]) -> Result<()> {
    let rows = sqlx::query(INDEXES_QUERY).bind(table).fetch_all(pool).await?;
    for row in rows {
        let index_name: String = row.try_get("index_name")?;
        let column_name: String = row.try_get("column_name")?;
        let is_unique: bool = row.try_get("is_unique")?;
        if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
            column.index = Some(IndexSpec {
                kind: if is_unique {
                    IndexKind::Unique
                } else {
                    IndexKind::Index
                },
                name: Some(index_name),
            });
        }
    }
    Ok(())
}

pub(super) async fn list_tables(pool: &PgPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = current_schema() ORDER BY tablename",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Maps `pg_constraint` action codes to their SQL names.
fn action_name(code: &str) -> &'static str {
    match code {
        "r" => "RESTRICT",
        "c" => "CASCADE",
        "n" => "SET NULL",
        "d" => "SET DEFAULT",
        _ => "NO ACTION",
    }
}

/// Normalizes a `pg_get_expr` default: drops the trailing type cast and
/// maps booleans to `1`/`0`.
fn normalize_default(expr: &str) -> Option<String> {
    let value = canonical_default(strip_cast(expr.trim()))?;
    match value.to_ascii_lowercase().as_str() {
        "true" => Some("1".to_string()),
        "false" => Some("0".to_string()),
        _ => Some(value),
    }
}

/// `'active'::character varying` to `'active'`, `NULL::text` to `NULL`.
/// Casts on other expressions are kept.
fn strip_cast(expr: &str) -> &str {
    if let Some(end) = quoted_literal_end(expr) {
        if expr[end..].starts_with("::") {
            return &expr[..end];
        }
        return expr;
    }
    match expr.split_once("::") {
        Some((head, _)) if !head.contains(['(', '\'', ' ']) => head,
        _ => expr,
    }
}

/// Returns the byte offset just past a leading `'...'` literal.
fn quoted_literal_end(expr: &str) -> Option<usize> {
    let rest = expr.strip_prefix('\'')?;
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

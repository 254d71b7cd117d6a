//! MySQL reader built on `information_schema`.
//!
//! `information_schema` columns are cast to `CHAR` because some server
//! versions report them as binary strings.

use std::collections::HashMap;

use oxide_reconcile_core::{
    ColumnSpec, ForeignKeySpec, GeneratedMode, GeneratedSpec, IndexKind, IndexSpec, MySqlDialect,
    canonical_default,
};
use sqlx::Row;
use sqlx::mysql::MySqlPool;
use tracing::debug;

use super::{column_from_native, parse_fk_action, quote_bare_default};
use crate::error::Result;

const COLUMNS_QUERY: &str = r"
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
       CAST(COLUMN_TYPE AS CHAR) AS column_type,
       CAST(IS_NULLABLE AS CHAR) AS is_nullable,
       CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
       CAST(COLUMN_KEY AS CHAR) AS column_key,
       CAST(EXTRA AS CHAR) AS extra,
       CAST(COLUMN_COMMENT AS CHAR) AS column_comment,
       CAST(GENERATION_EXPRESSION AS CHAR) AS generation_expression
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION
";

const STATISTICS_QUERY: &str = r"
SELECT CAST(INDEX_NAME AS CHAR) AS index_name,
       CAST(COLUMN_NAME AS CHAR) AS column_name,
       CAST(NON_UNIQUE AS SIGNED) AS non_unique
FROM information_schema.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY'
ORDER BY INDEX_NAME, SEQ_IN_INDEX
";

const FOREIGN_KEYS_QUERY: &str = r"
SELECT CAST(k.CONSTRAINT_NAME AS CHAR) AS constraint_name,
       CAST(k.COLUMN_NAME AS CHAR) AS column_name,
       CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS ref_table,
       CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS ref_column,
       CAST(r.DELETE_RULE AS CHAR) AS on_delete,
       CAST(r.UPDATE_RULE AS CHAR) AS on_update
FROM information_schema.KEY_COLUMN_USAGE k
JOIN information_schema.REFERENTIAL_CONSTRAINTS r
  ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
WHERE k.TABLE_SCHEMA = DATABASE() AND k.TABLE_NAME = ? AND k.REFERENCED_TABLE_NAME IS NOT NULL
";

pub(super) async fn read_columns(pool: &MySqlPool, table: &str) -> Result<Vec<ColumnSpec>> {
    let rows = sqlx::query(COLUMNS_QUERY).bind(table).fetch_all(pool).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("column_name")?;
        let column_type: String = row.try_get("column_type")?;
        let is_nullable: String = row.try_get("is_nullable")?;
        let default: Option<String> = row.try_get("column_default")?;
        let key: String = row.try_get("column_key")?;
        let extra: String = row.try_get::<Option<String>, _>("extra")?.unwrap_or_default();
        let generation: Option<String> = row.try_get("generation_expression")?;

        let mut column = column_from_native(&MySqlDialect, name, &column_type);
        column.not_null = is_nullable.eq_ignore_ascii_case("NO");
        column.primary_key = key == "PRI";
        column.comment = row
            .try_get::<Option<String>, _>("column_comment")?
            .unwrap_or_default();

        let extra_lower = extra.to_ascii_lowercase();
        column.auto_increment = extra_lower.contains("auto_increment");
        column.generated = generated_mode(&extra_lower).map(|mode| GeneratedSpec {
            expression: generation.unwrap_or_default(),
            mode,
        });
        if column.generated.is_none() {
            column.default_value = default
                .as_deref()
                .and_then(|raw| normalize_default(raw, &extra_lower));
        }

        columns.push(column);
    }

    if columns.is_empty() {
        return Ok(columns);
    }

    read_indexes(pool, table, &mut columns).await?;
    read_foreign_keys(pool, table, &mut columns).await?;

    debug!(table = %table, columns = columns.len(), "Read MySQL table");
    Ok(columns)
}

/// A single-column unique index named after its column is what MySQL
/// creates for an inline `UNIQUE`; it reads as the `unique` flag. Other
/// single-column indexes read as index requests.
async fn read_indexes(pool: &MySqlPool, table: &str, columns: &mut [ColumnSpec]) -> Result<()> {
    let rows = sqlx::query(STATISTICS_QUERY)
        .bind(table)
        .fetch_all(pool)
        .await?;

    let mut members: HashMap<String, Vec<(String, bool)>> = HashMap::new();
    let mut order = Vec::new();
    for row in rows {
        let index_name: String = row.try_get("index_name")?;
        let column_name: String = row.try_get("column_name")?;
        let non_unique: i64 = row.try_get("non_unique")?;
        if !members.contains_key(&index_name) {
            order.push(index_name.clone());
        }
        members
            .entry(index_name)
            .or_default()
            .push((column_name, non_unique == 0));
    }

    for index_name in order {
        let Some([(column_name, unique)]) = members.get(&index_name).map(Vec::as_slice) else {
            continue;
        };
        let Some(column) = columns.iter_mut().find(|c| &c.name == column_name) else {
            continue;
        };
        if *unique && index_name == *column_name {
            column.unique = true;
        } else {
            column.index = Some(IndexSpec {
                kind: if *unique {
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

async fn read_foreign_keys(
    pool: &MySqlPool,
    table: &str,
    columns: &mut [ColumnSpec],
) -> Result<()> {
    let rows = sqlx::query(FOREIGN_KEYS_QUERY)
        .bind(table)
        .fetch_all(pool)
        .await?;

    let mut per_constraint: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        let name: String = row.try_get("constraint_name")?;
        *per_constraint.entry(name).or_default() += 1;
    }

    for row in rows {
        let constraint: String = row.try_get("constraint_name")?;
        if per_constraint.get(&constraint) != Some(&1) {
            continue;
        }
        let column_name: String = row.try_get("column_name")?;
        let on_delete: String = row.try_get("on_delete")?;
        let on_update: String = row.try_get("on_update")?;
        if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
            column.foreign_key = Some(ForeignKeySpec {
                table: row.try_get("ref_table")?,
                column: row.try_get("ref_column")?,
                on_delete: parse_fk_action(&on_delete),
                on_update: parse_fk_action(&on_update),
            });
        }
    }
    Ok(())
}

pub(super) async fn list_tables(pool: &MySqlPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

fn generated_mode(extra: &str) -> Option<GeneratedMode> {
    if extra.contains("virtual generated") {
        Some(GeneratedMode::Virtual)
    } else if extra.contains("stored generated") {
        Some(GeneratedMode::Stored)
    } else {
        None
    }
}

/// Normalizes `COLUMN_DEFAULT`.
///
/// MySQL reports string defaults unquoted and expression defaults with a
/// `DEFAULT_GENERATED` marker in `EXTRA`; MariaDB quotes strings itself.
fn normalize_default(raw: &str, extra: &str) -> Option<String> {
    let value = canonical_default(raw)?;
    if value == "CURRENT_TIMESTAMP" || extra.contains("default_generated") {
        return Some(value);
    }
    Some(quote_bare_default(&value))
}

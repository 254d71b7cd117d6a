//! SQLite reader built on the `pragma_*` table-valued functions.

use std::collections::HashMap;

use oxide_reconcile_core::{
    ColumnSpec, ForeignKeySpec, GeneratedMode, GeneratedSpec, IndexKind, IndexSpec, SqliteDialect,
    canonical_default,
};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::{column_from_native, parse_fk_action};
use crate::error::Result;

/// `hidden` values reported by `pragma_table_xinfo`.
const HIDDEN_GENERATED_VIRTUAL: i64 = 2;
const HIDDEN_GENERATED_STORED: i64 = 3;

pub(super) async fn read_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnSpec>> {
    let rows: Vec<(String, String, i64, Option<String>, i64, i64)> = sqlx::query_as(
        "SELECT name, type, \"notnull\", dflt_value, pk, hidden \
         FROM pragma_table_xinfo(?) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut columns: Vec<ColumnSpec> = rows
        .into_iter()
        .map(|(name, native, not_null, default, pk, hidden)| {
            let mut column = column_from_native(&SqliteDialect, name, &native);
            column.primary_key = pk > 0;
            column.not_null = not_null != 0 || pk > 0;
            column.default_value = default.as_deref().and_then(canonical_default);
            column.generated = match hidden {
                HIDDEN_GENERATED_VIRTUAL => Some(GeneratedMode::Virtual),
                HIDDEN_GENERATED_STORED => Some(GeneratedMode::Stored),
                _ => None,
            }
            .map(|mode| GeneratedSpec {
                expression: String::new(),
                mode,
            });
            column
        })
        .collect();

    if uses_autoincrement(pool, table).await? {
        for column in columns.iter_mut().filter(|c| c.primary_key) {
            column.auto_increment = true;
        }
    }

    read_indexes(pool, table, &mut columns).await?;
    read_foreign_keys(pool, table, &mut columns).await?;

    debug!(table = %table, columns = columns.len(), "Read SQLite table");
    Ok(columns)
}

/// SQLite does not expose AUTOINCREMENT in any pragma; it only shows in
/// the original `CREATE TABLE` text.
async fn uses_autoincrement(pool: &SqlitePool, table: &str) -> Result<bool> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(row
        .and_then(|(sql,)| sql)
        .is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT")))
}

async fn read_indexes(pool: &SqlitePool, table: &str, columns: &mut [ColumnSpec]) -> Result<()> {
    let indexes: Vec<(String, i64, String)> =
        sqlx::query_as("SELECT name, \"unique\", origin FROM pragma_index_list(?)")
            .bind(table)
            .fetch_all(pool)
            .await?;

    for (index_name, unique, origin) in indexes {
        if origin == "pk" {
            continue;
        }
        let members: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&index_name)
                .fetch_all(pool)
                .await?;
        // Only single-column indexes on real columns map onto a column.
        let [(Some(column_name),)] = members.as_slice() else {
            continue;
        };
        let Some(column) = columns.iter_mut().find(|c| &c.name == column_name) else {
            continue;
        };

        if origin == "u" {
            column.unique = true;
        } else {
            column.index = Some(IndexSpec {
                kind: if unique != 0 {
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
    pool: &SqlitePool,
    table: &str,
    columns: &mut [ColumnSpec],
) -> Result<()> {
    let rows: Vec<(i64, String, String, Option<String>, String, String)> = sqlx::query_as(
        "SELECT id, \"table\", \"from\", \"to\", on_update, on_delete \
         FROM pragma_foreign_key_list(?) ORDER BY id, seq",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let mut per_constraint: HashMap<i64, usize> = HashMap::new();
    for (id, ..) in &rows {
        *per_constraint.entry(*id).or_default() += 1;
    }

    for (id, target, from, to, on_update, on_delete) in rows {
        if per_constraint.get(&id) != Some(&1) {
            continue;
        }
        // `to` is NULL when the parent's primary key is implied.
        let Some(to) = to else {
            continue;
        };
        if let Some(column) = columns.iter_mut().find(|c| c.name == from) {
            column.foreign_key = Some(ForeignKeySpec {
                table: target,
                column: to,
                on_delete: parse_fk_action(&on_delete),
                on_update: parse_fk_action(&on_update),
            });
        }
    }
    Ok(())
}

pub(super) async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

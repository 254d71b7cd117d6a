//! Dialect strategies.
//!
//! Each supported database gets one strategy object implementing
//! [`MigrationDialect`]. The strategy is the single source of truth for
//! mapping canonical types to native type names and back, and for turning
//! [`ColumnChange`]s into statements. Callers select a strategy through the
//! [`Dialect`] enum.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::column::{ColumnSpec, ForeignKeySpec, GeneratedSpec, IndexKind, IndexSpec, LogicalType};
use crate::diff::ColumnChange;
use crate::error::DialectError;

/// Prefix marking a statement that is advice for the operator and must
/// never be executed.
pub const ADVISORY_PREFIX: &str = "--";

/// Returns `true` if `statement` is an advisory comment.
#[must_use]
pub fn is_advisory(statement: &str) -> bool {
    statement.trim_start().starts_with(ADVISORY_PREFIX)
}

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

static MYSQL: MySqlDialect = MySqlDialect;
static POSTGRES: PostgresDialect = PostgresDialect;
static SQLITE: SqliteDialect = SqliteDialect;

impl Dialect {
    /// Every supported dialect.
    pub const ALL: [Self; 3] = [Self::MySql, Self::Postgres, Self::Sqlite];

    /// Returns the strategy object for this dialect.
    #[must_use]
    pub fn strategy(self) -> &'static dyn MigrationDialect {
        match self {
            Self::MySql => &MYSQL,
            Self::Postgres => &POSTGRES,
            Self::Sqlite => &SQLITE,
        }
    }

    /// Selects a dialect from a connection URL scheme such as
    /// `postgres://...` or `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// Returns [`DialectError::Unsupported`] for any other scheme.
    pub fn from_url(url: &str) -> Result<Self, DialectError> {
        let scheme = url
            .split_once(':')
            .map_or(url, |(scheme, _)| scheme);
        scheme
            .parse()
            .map_err(|_| DialectError::Unsupported(scheme.to_string()))
    }

    /// Returns the dialect name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.strategy().name()
    }

    /// Normalizes a column through this dialect's render/canonicalize pair.
    #[must_use]
    pub fn normalize(self, column: &ColumnSpec) -> ColumnSpec {
        self.strategy().normalize(column)
    }

    /// Synthesizes the statements for `changes` on `table`.
    #[must_use]
    pub fn synthesize(self, table: &str, changes: &[ColumnChange]) -> Vec<String> {
        self.strategy().synthesize(table, changes)
    }
}

impl FromStr for Dialect {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(DialectError::Unsupported(other.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A native type name mapped back to the canonical vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeType {
    pub logical: LogicalType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl NativeType {
    #[must_use]
    pub const fn new(logical: LogicalType) -> Self {
        Self {
            logical,
            length: None,
            precision: None,
            scale: None,
        }
    }

    #[must_use]
    pub const fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub const fn with_precision(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }
}

/// A native type name split into its parts, e.g.
/// `timestamp(6) without time zone` into `timestamp`, `[6]` and
/// `without time zone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeName {
    pub base: String,
    pub args: Vec<u32>,
    pub suffix: String,
}

impl TypeName {
    pub fn parse(native: &str) -> Self {
        let lower = native.trim().to_ascii_lowercase();
        let (base, args, suffix) = match (lower.find('('), lower.find(')')) {
            (Some(open), Some(close)) if close > open => (
                &lower[..open],
                lower[open + 1..close]
                    .split(',')
                    .filter_map(|a| a.trim().parse().ok())
                    .collect(),
                &lower[close + 1..],
            ),
            _ => (lower.as_str(), Vec::new(), ""),
        };
        Self {
            base: collapse_whitespace(base),
            args,
            suffix: collapse_whitespace(suffix),
        }
    }

    pub fn arg(&self, index: usize) -> Option<u32> {
        self.args.get(index).copied()
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dialect-specific type mapping and DDL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Maps a native type name, as read from the catalog or rendered by
    /// [`render_type`](Self::render_type), to the canonical vocabulary.
    fn canonicalize(&self, native: &str) -> NativeType;

    /// Renders the native type name for a column.
    fn render_type(&self, column: &ColumnSpec) -> String;

    /// Returns the auto-increment keyword, with a leading space.
    fn autoincrement_keyword(&self) -> String;

    /// Synthesizes the statements for `changes` on `table`.
    fn synthesize(&self, table: &str, changes: &[ColumnChange]) -> Vec<String>;

    /// Statements copying the structure and data of `table` into `backup`.
    fn backup_statements(&self, table: &str, backup: &str) -> Vec<String>;

    /// Returns the identifier quote character.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let escaped = name.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Whether column definitions may carry `COMMENT '...'`.
    fn supports_inline_comment(&self) -> bool {
        false
    }

    /// Whether the dialect stores column comments at all.
    fn supports_comments(&self) -> bool {
        true
    }

    /// Renders the default value of a column.
    fn render_default(&self, column: &ColumnSpec) -> Option<String> {
        column.default_value.clone()
    }

    /// Normalizes a column so that two columns compare equal exactly when
    /// they render to the same native column.
    fn normalize(&self, column: &ColumnSpec) -> ColumnSpec {
        let native = self.canonicalize(&self.render_type(column));
        let mut spec = column.clone();
        spec.logical_type = native.logical;
        spec.length = native.length;
        spec.precision = native.precision;
        spec.scale = native.scale;
        if !self.supports_comments() {
            spec.comment.clear();
        }
        spec.sanitized()
    }

    /// Renders the generated column clause.
    fn generated_clause(&self, generated: &GeneratedSpec) -> String {
        format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression,
            generated.mode.as_sql()
        )
    }

    /// Renders a column definition: type, `NOT NULL`, `DEFAULT`,
    /// auto-increment and inline comment. Key constraints are included
    /// only when `with_constraints` is set.
    fn column_definition(&self, column: &ColumnSpec, with_constraints: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.render_type(column)
        );

        if let Some(generated) = &column.generated {
            sql.push_str(&self.generated_clause(generated));
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        // Generated columns cannot carry a default.
        if column.generated.is_none() {
            if let Some(default) = self.render_default(column) {
                sql.push_str(" DEFAULT ");
                sql.push_str(&default);
            }
        }
        if with_constraints && column.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if column.auto_increment {
            sql.push_str(&self.autoincrement_keyword());
        }
        if with_constraints && column.unique && !column.primary_key {
            sql.push_str(" UNIQUE");
        }
        if self.supports_inline_comment() && !column.comment.is_empty() {
            sql.push_str(" COMMENT ");
            sql.push_str(&crate::column::quote_literal(&column.comment));
        }

        sql
    }

    /// Renders an inline `REFERENCES` clause.
    fn references_clause(&self, fk: &ForeignKeySpec) -> String {
        let mut sql = format!(
            " REFERENCES {} ({})",
            self.quote_identifier(&fk.table),
            self.quote_identifier(&fk.column)
        );
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql
    }

    /// Generates `CREATE [UNIQUE] INDEX` for a single column.
    fn create_index(&self, table: &str, column: &str, index: &IndexSpec) -> String {
        let unique = match index.kind {
            IndexKind::Unique => "UNIQUE ",
            IndexKind::Index => "",
        };
        format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            self.quote_identifier(&index.name_for(table, column)),
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates a table rename.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Generates a guarded table drop.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Operator instructions for restoring `table` from `backup`.
    fn recovery_instructions(&self, table: &str, backup: &str) -> String {
        format!(
            "The changes to {table} were rolled back. If {table} is not in its \
             original state, restore it from backup table {backup}:\n  {};\n  {};",
            self.drop_table(table),
            self.rename_table(backup, table)
        )
    }

    /// Statements rebuilding `table` with the `desired` columns, copying
    /// the data of columns present in `actual`. Only dialects that need an
    /// explicit rebuild procedure return `Some`.
    fn rebuild_statements(
        &self,
        _table: &str,
        _actual: &[ColumnSpec],
        _desired: &[ColumnSpec],
    ) -> Option<Vec<String>> {
        None
    }
}

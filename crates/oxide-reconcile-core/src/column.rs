//! Canonical, dialect-independent column model.
//!
//! A [`ColumnSpec`] describes a single column either as declared in code
//! (the desired shape) or as read back from a live database (the actual
//! shape). Both sides use the same vocabulary so the differ can compare
//! them attribute by attribute.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical column types understood by every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    /// Variable-length bounded string.
    String,
    /// Fixed-length string.
    FixedString,
    /// Unbounded text.
    Text,
    /// Very large text.
    LongText,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Exact decimal with precision and scale.
    Decimal,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time without zone.
    Datetime,
    /// Timestamp.
    Timestamp,
    /// Time of day.
    Time,
    /// Binary data.
    Binary,
    /// JSON document.
    Json,
}

impl LogicalType {
    /// Returns `true` for types where `length` is meaningful.
    #[must_use]
    pub const fn is_bounded(self) -> bool {
        matches!(self, Self::String | Self::FixedString | Self::Binary)
    }

    /// Returns `true` for types where `precision`/`scale` are meaningful.
    #[must_use]
    pub const fn is_decimal(self) -> bool {
        matches!(self, Self::Decimal)
    }

    /// Returns `true` for integer types.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::SmallInt | Self::Int | Self::BigInt)
    }

    /// Returns `true` for numeric types whose literals are written unquoted.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Float
                | Self::Double
                | Self::Decimal
                | Self::Boolean
        )
    }

    /// Returns the snake_case token for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::FixedString => "fixed_string",
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::SmallInt => "small_int",
            Self::Int => "int",
            Self::BigInt => "big_int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Binary => "binary",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Target of a foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    /// The referenced table name.
    pub table: String,
    /// The referenced column name.
    pub column: String,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKeySpec {
    /// Parses a `"table.column"` target. Returns `None` when either part
    /// is missing.
    #[must_use]
    pub fn parse_target(target: &str) -> Option<Self> {
        let (table, column) = target.trim().split_once('.')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some(Self {
            table: table.to_string(),
            column: column.to_string(),
            on_delete: None,
            on_update: None,
        })
    }
}

/// Storage mode of a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedMode {
    /// Computed on read.
    Virtual,
    /// Computed on write and stored.
    Stored,
}

impl GeneratedMode {
    /// Returns the SQL keyword for this mode.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Virtual => "VIRTUAL",
            Self::Stored => "STORED",
        }
    }
}

/// A generated (computed) column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSpec {
    /// SQL expression computing the value. May be empty when the
    /// dialect does not expose it through its catalog.
    pub expression: String,
    /// Storage mode.
    pub mode: GeneratedMode,
}

/// Kind of single-column index requested for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Plain secondary index.
    Index,
    /// Unique index.
    Unique,
}

/// Index request carried directly on the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index kind.
    pub kind: IndexKind,
    /// Explicit index name. When absent a name is derived from the table
    /// and column.
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    /// Returns the index name to use on `table` for `column`.
    #[must_use]
    pub fn name_for(&self, table: &str, column: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => match self.kind {
                IndexKind::Index => format!("idx_{table}_{column}"),
                IndexKind::Unique => format!("uniq_{table}_{column}"),
            },
        }
    }
}

/// One column's canonical description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Physical column identifier.
    pub name: String,
    /// Canonical type.
    pub logical_type: LogicalType,
    /// Length for bounded string/binary types.
    #[serde(default)]
    pub length: Option<u32>,
    /// Total digits, decimal types only.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Digits after the decimal point, decimal types only.
    #[serde(default)]
    pub scale: Option<u32>,
    /// Whether the column rejects NULL.
    #[serde(default)]
    pub not_null: bool,
    /// Dialect-normalized default expression or literal.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Column comment, empty when none.
    #[serde(default)]
    pub comment: String,
    /// Whether this column is (part of) the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether this column carries a single-column UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Whether this column auto-increments.
    #[serde(default)]
    pub auto_increment: bool,
    /// Foreign key target, if any.
    #[serde(default)]
    pub foreign_key: Option<ForeignKeySpec>,
    /// Generated column definition, if any.
    #[serde(default)]
    pub generated: Option<GeneratedSpec>,
    /// Index requested on this column, if any.
    #[serde(default)]
    pub index: Option<IndexSpec>,
}

impl ColumnSpec {
    /// Creates a nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            length: None,
            precision: None,
            scale: None,
            not_null: false,
            default_value: None,
            comment: String::new(),
            primary_key: false,
            unique: false,
            auto_increment: false,
            foreign_key: None,
            generated: None,
            index: None,
        }
    }

    /// Sets the length of a bounded type.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets decimal precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the (already normalized) default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Marks the column as primary key. Primary keys are implicitly NOT NULL.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Marks the column as UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the foreign key target.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySpec) -> Self {
        self.foreign_key = Some(fk);
        self
    }

    /// Sets the generated column definition.
    #[must_use]
    pub fn generated(mut self, generated: GeneratedSpec) -> Self {
        self.generated = Some(generated);
        self
    }

    /// Sets the index request.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.index = Some(index);
        self
    }

    /// Returns a copy with attributes that are meaningless for the
    /// logical type cleared (length on unbounded types, precision/scale
    /// on non-decimal types).
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut spec = self.clone();
        if !spec.logical_type.is_bounded() {
            spec.length = None;
        }
        if !spec.logical_type.is_decimal() {
            spec.precision = None;
            spec.scale = None;
        }
        spec
    }
}

/// Quotes a string literal, doubling embedded single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Canonicalizes a default expression read from a catalog.
///
/// Strips wrapping parentheses, maps the various "now" spellings to
/// `CURRENT_TIMESTAMP` and treats a literal `NULL` as no default.
#[must_use]
pub fn canonical_default(raw: &str) -> Option<String> {
    let mut value = raw.trim();
    while let Some(inner) = strip_wrapping_parens(value) {
        value = inner.trim();
    }
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    let lower = value.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "now()"
            | "current_timestamp"
            | "current_timestamp()"
            | "localtimestamp"
            | "localtimestamp()"
            | "transaction_timestamp()"
    ) {
        return Some("CURRENT_TIMESTAMP".to_string());
    }
    Some(value.to_string())
}

/// Returns the inside of `(..)` when the outer parentheses enclose the
/// whole expression.
fn strip_wrapping_parens(value: &str) -> Option<&str> {
    if !value.starts_with('(') || !value.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, ch) in value.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != value.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&value[1..value.len() - 1])
}

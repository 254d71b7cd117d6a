//! Column Model Builder.
//!
//! Turns declarative [`FieldDescriptor`]s into canonical [`ColumnSpec`]s.
//! The transform is pure and knows nothing about dialects.

use crate::column::{
    ColumnSpec, ForeignKeySpec, GeneratedSpec, IndexKind, IndexSpec, LogicalType, quote_literal,
};
use crate::field::{FieldDescriptor, NativeKind};

/// Precision used for decimal columns that do not specify one.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 10;
/// Scale used for decimal columns that do not specify one.
pub const DEFAULT_DECIMAL_SCALE: u32 = 2;

/// Builds the desired column model from field declarations.
///
/// Each field maps to exactly one [`ColumnSpec`] in declaration order,
/// except fields marked `skip`, which are omitted.
#[must_use]
pub fn build(fields: &[FieldDescriptor]) -> Vec<ColumnSpec> {
    fields
        .iter()
        .filter(|f| !f.skip)
        .map(build_column)
        .collect()
}

/// Builds a single column from its declaration.
#[must_use]
pub fn build_column(field: &FieldDescriptor) -> ColumnSpec {
    // An unknown explicit token falls back to the inferred type.
    let (logical_type, implied_length) = field
        .type_token
        .as_deref()
        .and_then(resolve_type_token)
        .unwrap_or_else(|| match field.native {
            NativeKind::Uuid => (LogicalType::FixedString, Some(36)),
            native => (infer_type(native), None),
        });

    let mut spec = ColumnSpec::new(field.name.clone(), logical_type);

    if logical_type.is_bounded() {
        spec.length = field.size.or(implied_length);
    }
    if logical_type.is_decimal() {
        spec.precision = Some(field.precision.unwrap_or(DEFAULT_DECIMAL_PRECISION));
        spec.scale = Some(field.scale.unwrap_or(DEFAULT_DECIMAL_SCALE));
    }

    spec.primary_key = field.primary_key;
    spec.not_null = !field.nullable || field.primary_key;
    spec.unique = field.unique;
    spec.auto_increment = field.auto_increment;
    spec.comment = field.comment.clone();
    spec.default_value = field.default.as_deref().and_then(normalize_default);

    spec.foreign_key = field.references.as_deref().and_then(|target| {
        ForeignKeySpec::parse_target(target).map(|mut fk| {
            fk.on_delete = field.on_delete;
            fk.on_update = field.on_update;
            fk
        })
    });

    spec.generated = match (&field.generated_expr, field.generated_mode) {
        (Some(expression), Some(mode)) => Some(GeneratedSpec {
            expression: expression.clone(),
            mode,
        }),
        _ => None,
    };

    if field.indexed || field.index_kind.is_some() {
        spec.index = Some(IndexSpec {
            kind: field.index_kind.unwrap_or(IndexKind::Index),
            name: field.index_name.clone(),
        });
    }

    spec
}

/// Parses an explicit type token. Returns the logical type plus the
/// length implied by aliases such as `uuid` and `enum`.
#[must_use]
pub fn resolve_type_token(token: &str) -> Option<(LogicalType, Option<u32>)> {
    let resolved = match token.trim().to_ascii_lowercase().as_str() {
        "string" | "varchar" => (LogicalType::String, None),
        "char" | "fixed_string" => (LogicalType::FixedString, None),
        "text" => (LogicalType::Text, None),
        "longtext" | "long_text" => (LogicalType::LongText, None),
        "smallint" | "small_int" => (LogicalType::SmallInt, None),
        "int" | "integer" => (LogicalType::Int, None),
        "bigint" | "big_int" => (LogicalType::BigInt, None),
        "float" => (LogicalType::Float, None),
        "double" => (LogicalType::Double, None),
        "decimal" | "numeric" => (LogicalType::Decimal, None),
        "bool" | "boolean" => (LogicalType::Boolean, None),
        "date" => (LogicalType::Date, None),
        "datetime" => (LogicalType::Datetime, None),
        "timestamp" => (LogicalType::Timestamp, None),
        "time" => (LogicalType::Time, None),
        "binary" | "blob" | "bytes" => (LogicalType::Binary, None),
        "json" => (LogicalType::Json, None),
        "uuid" => (LogicalType::FixedString, Some(36)),
        "enum" => (LogicalType::String, Some(255)),
        _ => return None,
    };
    Some(resolved)
}

/// Infers a logical type from a native value type.
#[must_use]
pub const fn infer_type(native: NativeKind) -> LogicalType {
    match native {
        NativeKind::Bool => LogicalType::Boolean,
        NativeKind::I8 | NativeKind::I16 | NativeKind::U8 => LogicalType::SmallInt,
        NativeKind::I32 | NativeKind::U16 => LogicalType::Int,
        NativeKind::I64 | NativeKind::U32 | NativeKind::U64 => LogicalType::BigInt,
        NativeKind::F32 => LogicalType::Float,
        NativeKind::F64 => LogicalType::Double,
        NativeKind::String => LogicalType::String,
        NativeKind::Uuid => LogicalType::FixedString,
        NativeKind::Bytes => LogicalType::Binary,
        NativeKind::Date => LogicalType::Date,
        NativeKind::Time => LogicalType::Time,
        NativeKind::DateTime => LogicalType::Datetime,
        NativeKind::Decimal => LogicalType::Decimal,
        NativeKind::Json => LogicalType::Json,
    }
}

/// Normalizes a default literal as written by an author.
///
/// `now` becomes `CURRENT_TIMESTAMP`, booleans become `1`/`0`, numbers
/// pass through unquoted and everything else is quoted. `null` means no
/// default.
#[must_use]
pub fn normalize_default(literal: &str) -> Option<String> {
    let trimmed = literal.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "null" => None,
        "now" | "now()" | "current_timestamp" | "current_timestamp()" => {
            Some("CURRENT_TIMESTAMP".to_string())
        }
        "true" => Some("1".to_string()),
        "false" => Some("0".to_string()),
        _ if is_numeric_literal(trimmed) => Some(trimmed.to_string()),
        _ => Some(quote_literal(trimmed)),
    }
}

fn is_numeric_literal(value: &str) -> bool {
    !value.is_empty()
        && (value.parse::<i64>().is_ok() || value.parse::<f64>().is_ok_and(f64::is_finite))
}

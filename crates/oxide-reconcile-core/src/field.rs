//! Declarative per-field metadata registry.
//!
//! Entities describe their persisted fields up front as plain
//! [`FieldDescriptor`] values, either by implementing [`Entity`] or by
//! loading a [`TableModel`] from a file. Nothing here is introspected at
//! runtime.
//!
//! ```rust
//! use oxide_reconcile_core::{Entity, FieldDescriptor, NativeKind};
//!
//! struct User;
//!
//! impl Entity for User {
//!     const TABLE: &'static str = "users";
//!
//!     fn fields() -> Vec<FieldDescriptor> {
//!         vec![
//!             FieldDescriptor::new("id", NativeKind::I64).primary_key().auto_increment(),
//!             FieldDescriptor::new("email", NativeKind::String).size(255).not_null().unique(),
//!             FieldDescriptor::new("status", NativeKind::String)
//!                 .type_token("enum")
//!                 .default_literal("active"),
//!             FieldDescriptor::new("created_at", NativeKind::DateTime).default_literal("now"),
//!         ]
//!     }
//! }
//!
//! assert_eq!(User::fields().len(), 4);
//! ```

use serde::{Deserialize, Serialize};

use crate::column::{ForeignKeyAction, GeneratedMode, IndexKind};

/// Native value type of a field, used when no explicit type token is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    /// Boolean.
    Bool,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    String,
    /// Byte sequence.
    Bytes,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Exact decimal.
    Decimal,
    /// UUID.
    Uuid,
    /// Nested or generic structure (maps, lists, structs).
    Json,
}

impl NativeKind {
    /// Maps a Rust type name to a native kind. `Option<T>` is unwrapped and
    /// reported as nullable.
    ///
    /// Returns `(kind, nullable)`.
    #[must_use]
    pub fn from_rust_type(rust_type: &str) -> (Self, bool) {
        let trimmed = rust_type.trim();
        if let Some(inner) = trimmed
            .strip_prefix("Option<")
            .and_then(|s| s.strip_suffix('>'))
        {
            return (Self::from_rust_type(inner).0, true);
        }
        let kind = match trimmed {
            "bool" => Self::Bool,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" | "isize" => Self::I32,
            "i64" | "i128" => Self::I64,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" | "u128" | "usize" => Self::U64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "String" | "&str" | "str" | "char" => Self::String,
            "Vec<u8>" | "&[u8]" | "Bytes" => Self::Bytes,
            "Uuid" | "uuid::Uuid" => Self::Uuid,
            s if s.ends_with("NaiveDate") => Self::Date,
            s if s.ends_with("NaiveTime") => Self::Time,
            s if s.contains("DateTime") => Self::DateTime,
            s if s.ends_with("Decimal") => Self::Decimal,
            _ => Self::Json,
        };
        (kind, false)
    }
}

/// Declarative metadata for one persisted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Physical column name.
    pub name: String,
    /// Native value type.
    pub native: NativeKind,
    /// Explicit type token (e.g. `"varchar"`, `"uuid"`), parsed
    /// case-insensitively.
    #[serde(default)]
    pub type_token: Option<String>,
    /// Length for bounded types.
    #[serde(default)]
    pub size: Option<u32>,
    /// Decimal precision.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Decimal scale.
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub unique: bool,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether a plain index is requested.
    #[serde(default)]
    pub indexed: bool,
    /// Explicit index name.
    #[serde(default)]
    pub index_name: Option<String>,
    /// Explicit index kind. Defaults to a plain index when `indexed` is set.
    #[serde(default)]
    pub index_kind: Option<IndexKind>,
    /// Raw default literal as written by the author (e.g. `"now"`,
    /// `"true"`, `"42"`, `"active"`).
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub comment: String,
    /// Foreign key target as `"table.column"`.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
    /// Generated column expression.
    #[serde(default)]
    pub generated_expr: Option<String>,
    #[serde(default)]
    pub generated_mode: Option<GeneratedMode>,
    /// Field is not persisted.
    #[serde(default)]
    pub skip: bool,
    /// Opaque to this crate.
    #[serde(default)]
    pub encrypted: bool,
    /// Opaque to this crate.
    #[serde(default)]
    pub hidden: bool,
    /// Opaque to this crate.
    #[serde(default)]
    pub readonly: bool,
}

const fn default_nullable() -> bool {
    true
}

impl FieldDescriptor {
    /// Creates a nullable field of the given native kind.
    #[must_use]
    pub fn new(name: impl Into<String>, native: NativeKind) -> Self {
        Self {
            name: name.into(),
            native,
            type_token: None,
            size: None,
            precision: None,
            scale: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            nullable: true,
            indexed: false,
            index_name: None,
            index_kind: None,
            default: None,
            comment: String::new(),
            references: None,
            on_delete: None,
            on_update: None,
            generated_expr: None,
            generated_mode: None,
            skip: false,
            encrypted: false,
            hidden: false,
            readonly: false,
        }
    }

    /// Creates a field from a Rust type name such as `"Option<i64>"`.
    #[must_use]
    pub fn from_rust_type(name: impl Into<String>, rust_type: &str) -> Self {
        let (native, nullable) = NativeKind::from_rust_type(rust_type);
        let mut field = Self::new(name, native);
        field.nullable = nullable;
        field
    }

    #[must_use]
    pub fn type_token(mut self, token: impl Into<String>) -> Self {
        self.type_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Marks the field as primary key (implies NOT NULL).
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Requests a plain index with a derived name.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Requests an index with an explicit name and kind.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, kind: IndexKind) -> Self {
        self.indexed = true;
        self.index_name = Some(name.into());
        self.index_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn default_literal(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets a foreign key target (`"table.column"`) with referential actions.
    #[must_use]
    pub fn references(
        mut self,
        target: impl Into<String>,
        on_delete: Option<ForeignKeyAction>,
        on_update: Option<ForeignKeyAction>,
    ) -> Self {
        self.references = Some(target.into());
        self.on_delete = on_delete;
        self.on_update = on_update;
        self
    }

    #[must_use]
    pub fn generated(mut self, expression: impl Into<String>, mode: GeneratedMode) -> Self {
        self.generated_expr = Some(expression.into());
        self.generated_mode = Some(mode);
        self
    }

    /// Excludes the field from the column model.
    #[must_use]
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// An entity type with an up-front field registry.
pub trait Entity {
    /// The SQL table name.
    const TABLE: &'static str;

    /// Returns the persisted fields in declaration order.
    fn fields() -> Vec<FieldDescriptor>;
}

/// A table's declarative model in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableModel {
    /// The SQL table name.
    pub table: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

impl TableModel {
    /// Builds the model of an [`Entity`].
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE.to_string(),
            fields: E::fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rust_type() {
        assert_eq!(NativeKind::from_rust_type("i64"), (NativeKind::I64, false));
        assert_eq!(
            NativeKind::from_rust_type("Option<String>"),
            (NativeKind::String, true)
        );
        assert_eq!(
            NativeKind::from_rust_type("Vec<u8>"),
            (NativeKind::Bytes, false)
        );
        assert_eq!(
            NativeKind::from_rust_type("chrono::DateTime<Utc>"),
            (NativeKind::DateTime, false)
        );
        assert_eq!(
            NativeKind::from_rust_type("chrono::NaiveDate"),
            (NativeKind::Date, false)
        );
        assert_eq!(
            NativeKind::from_rust_type("HashMap<String, String>"),
            (NativeKind::Json, false)
        );
    }

    #[test]
    fn test_field_builder() {
        let field = FieldDescriptor::new("id", NativeKind::I64)
            .primary_key()
            .auto_increment();
        assert!(field.primary_key);
        assert!(field.auto_increment);
        assert!(!field.nullable);

        let field = FieldDescriptor::from_rust_type("bio", "Option<String>");
        assert!(field.nullable);
        assert_eq!(field.native, NativeKind::String);
    }

    #[test]
    fn test_table_model_deserialize_defaults() {
        let json = r#"{
            "table": "users",
            "fields": [
                {"name": "id", "native": "i64", "primary_key": true, "nullable": false},
                {"name": "status", "native": "string", "type_token": "enum", "default": "active"}
            ]
        }"#;
        let model: TableModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.table, "users");
        assert_eq!(model.fields.len(), 2);
        assert!(model.fields[1].nullable);
        assert_eq!(model.fields[1].default.as_deref(), Some("active"));
    }

    struct Post;

    impl Entity for Post {
        const TABLE: &'static str = "posts";

        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("id", NativeKind::I64).primary_key(),
                FieldDescriptor::new("cache", NativeKind::Json).skip(),
            ]
        }
    }

    #[test]
    fn test_table_model_of_entity() {
        let model = TableModel::of::<Post>();
        assert_eq!(model.table, "posts");
        assert_eq!(model.fields.len(), 2);
    }
}

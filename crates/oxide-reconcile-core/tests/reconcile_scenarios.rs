//! End-to-end scenarios for the pure reconciliation pipeline.
//!
//! These tests declare entities through the field registry, build the
//! desired columns, diff them against hand-written live columns and check
//! the statements each dialect synthesizes.

use oxide_reconcile_core::{
    ChangeKind, ColumnSpec, Dialect, Entity, FieldDescriptor, IndexKind, LogicalType, NativeKind,
    TableModel, build, compare, diff_warnings, is_advisory,
};

// =============================================================================
// Entities
// =============================================================================

struct Account;

impl Entity for Account {
    const TABLE: &'static str = "accounts";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("id", NativeKind::I64)
                .primary_key()
                .auto_increment(),
            FieldDescriptor::new("email", NativeKind::String)
                .size(255)
                .not_null()
                .index("accounts_email_key", IndexKind::Unique),
            FieldDescriptor::new("status", NativeKind::String)
                .size(20)
                .default_literal("active"),
            FieldDescriptor::new("balance", NativeKind::Decimal).default_literal("0"),
            FieldDescriptor::new("cache", NativeKind::Json).skip(),
        ]
    }
}

/// The live shape of `accounts` before the latest release.
fn live_accounts() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id", LogicalType::BigInt)
            .primary_key()
            .auto_increment(),
        ColumnSpec::new("email", LogicalType::String)
            .length(255)
            .not_null(),
        ColumnSpec::new("status", LogicalType::String).length(10),
        ColumnSpec::new("nickname", LogicalType::String).length(50),
    ]
}

// =============================================================================
// Model building
// =============================================================================

#[test]
fn test_entity_builds_columns_in_order() {
    let columns = build(&Account::fields());
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "email", "status", "balance"]);

    let status = &columns[2];
    assert_eq!(status.logical_type, LogicalType::String);
    assert_eq!(status.length, Some(20));
    assert_eq!(status.default_value.as_deref(), Some("'active'"));
    assert!(!status.not_null);

    let balance = &columns[3];
    assert_eq!((balance.precision, balance.scale), (Some(10), Some(2)));
    assert_eq!(balance.default_value.as_deref(), Some("0"));
}

#[test]
fn test_table_model_from_json() {
    let json = r#"{
        "table": "accounts",
        "fields": [
            {"name": "id", "native": "i64", "primary_key": true, "auto_increment": true},
            {"name": "email", "native": "string", "size": 255, "nullable": false}
        ]
    }"#;
    let model: TableModel = serde_json::from_str(json).unwrap();
    assert_eq!(model.table, "accounts");

    let columns = build(&model.fields);
    assert_eq!(columns.len(), 2);
    assert!(columns[0].not_null);
    assert!(columns[1].not_null);
    assert_eq!(columns[1].length, Some(255));
}

#[test]
fn test_table_model_of_entity() {
    let model = TableModel::of::<Account>();
    assert_eq!(model.table, "accounts");
    assert_eq!(model.fields.len(), 5);
}

// =============================================================================
// Diff + synthesis per dialect
// =============================================================================

#[test]
fn test_mysql_single_alter() {
    let desired = build(&Account::fields());
    let changes = compare(Dialect::MySql, &live_accounts(), &desired);

    let summary: Vec<(ChangeKind, &str)> = changes
        .iter()
        .map(|c| (c.kind, c.column.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ChangeKind::Add, "balance"),
            (ChangeKind::Drop, "nickname"),
            (ChangeKind::Modify, "status"),
        ]
    );

    let statements = Dialect::MySql.synthesize(Account::TABLE, &changes);
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE `accounts` ADD COLUMN `balance` DECIMAL(10,2) DEFAULT 0, \
             DROP COLUMN `nickname`, \
             MODIFY COLUMN `status` VARCHAR(20) DEFAULT 'active'"
        ]
    );
}

#[test]
fn test_postgres_statement_per_attribute() {
    let desired = build(&Account::fields());
    let changes = compare(Dialect::Postgres, &live_accounts(), &desired);
    let statements = Dialect::Postgres.synthesize(Account::TABLE, &changes);
    assert_eq!(
        statements,
        vec![
            "ALTER TABLE \"accounts\" ADD COLUMN \"balance\" NUMERIC(10,2) DEFAULT 0",
            "ALTER TABLE \"accounts\" DROP COLUMN \"nickname\"",
            "ALTER TABLE \"accounts\" ALTER COLUMN \"status\" TYPE VARCHAR(20)",
            "ALTER TABLE \"accounts\" ALTER COLUMN \"status\" SET DEFAULT 'active'",
        ]
    );
}

#[test]
fn test_sqlite_degrades_to_advisories() {
    let desired = build(&Account::fields());
    let changes = compare(Dialect::Sqlite, &live_accounts(), &desired);
    let statements = Dialect::Sqlite.synthesize(Account::TABLE, &changes);

    assert_eq!(
        statements[0],
        "ALTER TABLE \"accounts\" ADD COLUMN \"balance\" NUMERIC(10,2) DEFAULT 0"
    );
    let advisories: Vec<&String> = statements.iter().filter(|s| is_advisory(s)).collect();
    // `nickname` drop and `status` length and default change.
    assert_eq!(advisories.len(), 2);
    assert!(advisories[0].contains("\"nickname\""));
    assert!(advisories[1].contains("\"status\""));
}

#[test]
fn test_index_request_does_not_show_as_drift() {
    // The index lives on the column itself, never in the comment.
    let desired = build(&Account::fields());
    let email = desired.iter().find(|c| c.name == "email").unwrap();
    assert!(email.comment.is_empty());
    assert_eq!(email.index.as_ref().unwrap().kind, IndexKind::Unique);

    for dialect in Dialect::ALL {
        let changes = compare(dialect, &live_accounts(), &desired);
        assert!(changes.iter().all(|c| c.column != "email"));
    }
}

#[test]
fn test_warnings_do_not_become_statements() {
    let mut live = live_accounts();
    live[0].auto_increment = false;
    let desired = build(&Account::fields());

    let warnings = diff_warnings(&live, &desired);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].to_string().contains("auto-increment"));

    let changes = compare(Dialect::MySql, &live, &desired);
    assert!(changes.iter().all(|c| c.column != "id"));
}

#[test]
fn test_compare_is_deterministic_across_dialects() {
    let desired = build(&Account::fields());
    for dialect in Dialect::ALL {
        let first = compare(dialect, &live_accounts(), &desired);
        let first_sql = dialect.synthesize(Account::TABLE, &first);
        for _ in 0..5 {
            let again = compare(dialect, &live_accounts(), &desired);
            assert_eq!(again, first);
            assert_eq!(dialect.synthesize(Account::TABLE, &again), first_sql);
        }
    }
}

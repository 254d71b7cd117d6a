//! Safe executor scenarios against in-memory SQLite.

use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use oxide_reconcile::introspect::{list_tables, read_columns};
use oxide_reconcile::prelude::*;
use oxide_reconcile::{backup_table_name, parse_backup_timestamp};
use oxide_reconcile_core::build;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

// =============================================================================
// Fixtures
// =============================================================================

async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create test pool")
}

async fn execute(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

async fn create_accounts(pool: &SqlitePool) {
    execute(
        pool,
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email VARCHAR(255) NOT NULL
        )",
    )
    .await;
    execute(pool, "INSERT INTO accounts (email) VALUES ('ada@example.com')").await;
}

async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
    read_columns(&DatabasePool::from(pool.clone()), table)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

async fn tables(pool: &SqlitePool) -> Vec<String> {
    list_tables(&DatabasePool::from(pool.clone())).await.unwrap()
}

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
                .not_null(),
            FieldDescriptor::new("nickname", NativeKind::String)
                .size(50)
                .indexed(),
            FieldDescriptor::new("score", NativeKind::F64).default_literal("0"),
        ]
    }
}

/// Records every reported result.
#[derive(Default)]
struct RecordingSink {
    results: Mutex<Vec<ReconciliationResult>>,
}

impl ReportSink for RecordingSink {
    fn report(&self, result: &ReconciliationResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

// =============================================================================
// Apply
// =============================================================================

#[tokio::test]
async fn test_apply_then_reconcile_is_idempotent() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;
    let executor = SafeExecutor::new(pool.clone()).sink(Arc::new(NullSink));

    let first = executor.reconcile_entity::<Account>().await.unwrap();
    assert!(first.success, "{:?}", first.error);
    assert_eq!(first.changes.len(), 2);
    assert!(first.changes.iter().all(|c| c.kind == ChangeKind::Add));
    assert_eq!(
        first.statements,
        vec![
            r#"ALTER TABLE "accounts" ADD COLUMN "nickname" VARCHAR(50)"#,
            r#"CREATE INDEX "idx_accounts_nickname" ON "accounts" ("nickname")"#,
            r#"ALTER TABLE "accounts" ADD COLUMN "score" REAL DEFAULT 0"#,
        ]
    );
    let backup = first.backup_table.clone().unwrap();
    assert!(backup.starts_with("accounts_backup_"));
    assert!(tables(&pool).await.contains(&backup));

    assert_eq!(
        column_names(&pool, "accounts").await,
        vec!["id", "email", "nickname", "score"]
    );

    let second = executor.reconcile_entity::<Account>().await.unwrap();
    assert!(second.success);
    assert!(second.changes.is_empty());
    assert!(second.statements.is_empty());
    assert!(second.warnings.is_empty());
    assert_eq!(second.backup_table, None);
}

#[tokio::test]
async fn test_backup_keeps_rows() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;

    let result = SafeExecutor::new(pool.clone())
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap();
    let backup = result.backup_table.unwrap();

    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{backup}\""))
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(column_names(&pool, &backup).await, vec!["id", "email"]);
}

#[tokio::test]
async fn test_no_backup_option() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;

    let result = SafeExecutor::new(pool.clone())
        .backup(false)
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.backup_table, None);
    assert_eq!(tables(&pool).await, vec!["accounts"]);
}

#[tokio::test]
async fn test_dry_run_leaves_schema_unchanged() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;
    let db = DatabasePool::from(pool.clone());
    let before = read_columns(&db, "accounts").await.unwrap();

    let result = SafeExecutor::new(pool.clone())
        .dry_run(true)
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.dry_run);
    assert_eq!(result.statements.len(), 3);
    assert_eq!(result.backup_table, None);
    assert_eq!(read_columns(&db, "accounts").await.unwrap(), before);
    assert_eq!(tables(&pool).await, vec!["accounts"]);
}

#[tokio::test]
async fn test_dry_run_from_config_file() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "dry_run": true }}"#).unwrap();
    let options = ExecutorOptions::from_file(file.path()).unwrap();

    let result = SafeExecutor::new(pool.clone())
        .options(options)
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap();

    assert!(result.dry_run);
    assert_eq!(column_names(&pool, "accounts").await, vec!["id", "email"]);
}

#[tokio::test]
async fn test_failure_rolls_back_whole_plan() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;
    let executor = SafeExecutor::new(pool.clone()).sink(Arc::new(NullSink));

    let plan = ReconcilePlan {
        table: "accounts".into(),
        changes: Vec::new(),
        statements: vec![
            r#"ALTER TABLE "accounts" ADD COLUMN "a" TEXT"#.into(),
            r#"ALTER TABLE "missing" ADD COLUMN "b" TEXT"#.into(),
            r#"ALTER TABLE "accounts" ADD COLUMN "c" TEXT"#.into(),
        ],
        warnings: Vec::new(),
    };
    let result = executor.apply_plan(&plan).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_statement.as_deref(), Some(plan.statements[1].as_str()));
    assert!(result.error.is_some());

    let backup = result.backup_table.clone().unwrap();
    let instructions = result.recovery_instructions.unwrap();
    assert!(instructions.contains(&backup));
    assert!(instructions.contains(r#"RENAME TO "accounts""#));

    assert_eq!(column_names(&pool, "accounts").await, vec!["id", "email"]);
    assert!(tables(&pool).await.contains(&backup));
}

#[tokio::test]
async fn test_failure_without_backup_has_no_instructions() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;

    let plan = ReconcilePlan {
        table: "accounts".into(),
        changes: Vec::new(),
        statements: vec![r#"ALTER TABLE "accounts" ADD COLUMN "id" TEXT"#.into()],
        warnings: Vec::new(),
    };
    let result = SafeExecutor::new(pool.clone())
        .backup(false)
        .sink(Arc::new(NullSink))
        .apply_plan(&plan)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.backup_table, None);
    assert_eq!(result.recovery_instructions, None);
}

#[tokio::test]
async fn test_sqlite_drop_is_advisory_noop() {
    let pool = create_test_pool().await;
    execute(
        &pool,
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email VARCHAR(255) NOT NULL,
            nickname VARCHAR(50),
            score REAL DEFAULT 0,
            legacy TEXT
        )",
    )
    .await;

    let result = SafeExecutor::new(pool.clone())
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].kind, ChangeKind::Drop);
    assert_eq!(result.statements.len(), 1);
    assert!(result.statements[0].starts_with("-- "));
    assert_eq!(result.backup_table, None);
    assert!(column_names(&pool, "accounts").await.contains(&"legacy".to_string()));
}

#[tokio::test]
async fn test_missing_table() {
    let pool = create_test_pool().await;
    let err = SafeExecutor::new(pool)
        .sink(Arc::new(NullSink))
        .reconcile_entity::<Account>()
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::TableNotFound(t) if t == "accounts"));
}

#[tokio::test]
async fn test_sink_receives_each_result() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;
    let sink = Arc::new(RecordingSink::default());
    let executor = SafeExecutor::new(pool).sink(sink.clone());

    executor.reconcile_entity::<Account>().await.unwrap();
    executor.reconcile_entity::<Account>().await.unwrap();

    let results = sink.results.lock().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].summaries().len(), 2);
    assert_eq!(results[0].summaries()[0].to_string(), "+ add      nickname: new column");
    assert!(results[1].changes.is_empty());
}

// =============================================================================
// Rebuild
// =============================================================================

#[tokio::test]
async fn test_rebuild_table() {
    let pool = create_test_pool().await;
    execute(
        &pool,
        "CREATE TABLE accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email VARCHAR(255) NOT NULL,
            legacy TEXT
        )",
    )
    .await;
    execute(
        &pool,
        "INSERT INTO accounts (email, legacy) VALUES ('ada@example.com', 'x')",
    )
    .await;

    let desired = build(&[
        FieldDescriptor::new("id", NativeKind::I64)
            .primary_key()
            .auto_increment(),
        FieldDescriptor::new("email", NativeKind::String)
            .size(255)
            .not_null(),
        FieldDescriptor::new("status", NativeKind::String)
            .size(20)
            .not_null()
            .default_literal("active"),
    ]);

    let executor = SafeExecutor::new(pool.clone()).sink(Arc::new(NullSink));
    let result = executor.rebuild_table("accounts", &desired).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.changes.len(), 2);
    assert!(result.statements[0].starts_with(r#"CREATE TABLE "accounts__rebuild""#));

    assert_eq!(
        column_names(&pool, "accounts").await,
        vec!["id", "email", "status"]
    );
    let (email, status): (String, String) =
        sqlx::query_as("SELECT email, status FROM accounts")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(email, "ada@example.com");
    assert_eq!(status, "active");

    let backup = result.backup_table.unwrap();
    assert!(column_names(&pool, &backup).await.contains(&"legacy".to_string()));
    assert!(!tables(&pool).await.contains(&"accounts__rebuild".to_string()));

    let actual = executor.read_schema("accounts").await.unwrap();
    assert!(executor.diff(&actual, &desired).is_empty());
}

#[tokio::test]
async fn test_rebuild_widens_column() {
    let pool = create_test_pool().await;
    execute(
        &pool,
        "CREATE TABLE tags (
            id INTEGER PRIMARY KEY,
            label VARCHAR(50) NOT NULL
        )",
    )
    .await;
    execute(&pool, "INSERT INTO tags (label) VALUES ('rust')").await;

    let fields = [
        FieldDescriptor::new("id", NativeKind::I64).primary_key(),
        FieldDescriptor::new("label", NativeKind::String)
            .size(100)
            .not_null(),
    ];
    let desired = build(&fields);
    let executor = SafeExecutor::new(pool.clone())
        .backup(false)
        .sink(Arc::new(NullSink));

    let advised = executor.reconcile("tags", &fields).await.unwrap();
    assert!(advised.success);
    assert_eq!(advised.changes.len(), 1);
    assert_eq!(advised.changes[0].kind, ChangeKind::Modify);
    assert_eq!(advised.statements.len(), 1);
    assert!(advised.statements[0].starts_with("-- "));

    let result = executor.rebuild_table("tags", &desired).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert!(result.statements[0].contains(r#""label" VARCHAR(100) NOT NULL"#));

    let actual = executor.read_schema("tags").await.unwrap();
    assert_eq!(actual[1].length, Some(100));
    assert!(executor.diff(&actual, &desired).is_empty());
    let label: String = sqlx::query_scalar("SELECT label FROM tags")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(label, "rust");
}

#[tokio::test]
async fn test_rebuild_without_drift_is_noop() {
    let pool = create_test_pool().await;
    create_accounts(&pool).await;
    let desired = build(&[
        FieldDescriptor::new("id", NativeKind::I64)
            .primary_key()
            .auto_increment(),
        FieldDescriptor::new("email", NativeKind::String)
            .size(255)
            .not_null(),
    ]);

    let result = SafeExecutor::new(pool.clone())
        .sink(Arc::new(NullSink))
        .rebuild_table("accounts", &desired)
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.statements.is_empty());
    assert_eq!(result.backup_table, None);
}

// =============================================================================
// Backup cleanup
// =============================================================================

#[tokio::test]
async fn test_cleanup_backups() {
    let pool = create_test_pool().await;
    let fresh = backup_table_name("accounts", Utc::now());
    for name in [
        "accounts_backup_20200101000000",
        "accounts_backup_20200101000000_1",
        "other_backup_20200101000000",
        fresh.as_str(),
    ] {
        execute(&pool, &format!("CREATE TABLE \"{name}\" (id INTEGER)")).await;
    }

    let dropped = SafeExecutor::new(pool.clone())
        .cleanup_backups("accounts", chrono::Duration::days(7))
        .await
        .unwrap();

    assert_eq!(
        dropped,
        vec![
            "accounts_backup_20200101000000",
            "accounts_backup_20200101000000_1"
        ]
    );
    let remaining = tables(&pool).await;
    assert!(remaining.contains(&fresh));
    assert!(remaining.contains(&"other_backup_20200101000000".to_string()));
    assert!(parse_backup_timestamp("accounts", &fresh).is_some());
}

#[tokio::test]
async fn test_cleanup_backups_retention_beyond_calendar() {
    let pool = create_test_pool().await;
    execute(&pool, r#"CREATE TABLE "accounts_backup_20200101000000" (id INTEGER)"#).await;

    let dropped = SafeExecutor::new(pool.clone())
        .cleanup_backups("accounts", chrono::Duration::days(i64::from(u32::MAX)))
        .await
        .unwrap();

    assert!(dropped.is_empty());
    let remaining = tables(&pool).await;
    assert!(remaining.contains(&"accounts_backup_20200101000000".to_string()));
}

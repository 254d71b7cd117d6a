//! oxide-reconcile CLI
//!
//! Command-line tool for reconciling live tables with JSON model files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_reconcile::prelude::*;
use oxide_reconcile_core::{MigrationDialect, build};

/// Reconcile live table columns with declarative models.
#[derive(Parser)]
#[command(name = "oxide-reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:`, `postgres://` or `mysql://`).
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// JSON file with executor options.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the live columns of a table, or list tables.
    Inspect {
        /// Table name (all tables are listed if not specified).
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Show the changes and statements needed to match a model.
    Diff {
        /// JSON model file.
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Apply the changes needed to match a model.
    Apply {
        /// JSON model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,

        /// Skip the pre-apply backup table.
        #[arg(long)]
        no_backup: bool,
    },

    /// Rebuild a SQLite table into the shape of a model.
    Rebuild {
        /// JSON model file.
        #[arg(short, long)]
        model: PathBuf,

        /// Skip the pre-apply backup table.
        #[arg(long)]
        no_backup: bool,
    },

    /// Drop backup tables older than the retention window.
    CleanupBackups {
        /// Table whose backups are cleaned up.
        #[arg(short, long)]
        table: String,

        /// Retention window in days.
        #[arg(short, long)]
        retention_days: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = match &cli.config {
        Some(path) => ExecutorOptions::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ExecutorOptions::default(),
    };

    let pool = DatabasePool::connect(&cli.database).await?;
    let sink: Arc<dyn ReportSink> = if cli.json {
        Arc::new(NullSink)
    } else {
        Arc::new(TracingSink)
    };
    let executor = SafeExecutor::new(pool).options(options).sink(sink);

    match cli.command {
        Commands::Inspect { table: None } => {
            let tables = oxide_reconcile::introspect::list_tables(executor.pool()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in tables {
                    println!("{table}");
                }
            }
        }

        Commands::Inspect { table: Some(table) } => {
            let columns = executor.read_schema(&table).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                print_columns(executor.dialect(), &table, &columns);
            }
        }

        Commands::Diff { model } => {
            let model = load_model(&model)?;
            let desired = build(&model.fields);
            let actual = executor.read_schema(&model.table).await?;
            let plan = executor.plan(&model.table, &actual, &desired);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else if plan.is_empty() {
                info!(table = %model.table, "Schema is up to date");
            } else {
                for summary in plan.summaries() {
                    println!("{summary}");
                }
                for warning in &plan.warnings {
                    println!("! {warning}");
                }
                println!();
                print_statements(&plan.statements);
            }
        }

        Commands::Apply {
            model,
            dry_run,
            no_backup,
        } => {
            let model = load_model(&model)?;
            let mut executor = executor;
            if dry_run {
                executor = executor.dry_run(true);
            }
            if no_backup {
                executor = executor.backup(false);
            }
            let result = executor.reconcile_model(&model).await?;
            finish(&result, cli.json)?;
        }

        Commands::Rebuild { model, no_backup } => {
            let model = load_model(&model)?;
            let executor = if no_backup {
                executor.backup(false)
            } else {
                executor
            };
            let desired = build(&model.fields);
            let result = executor.rebuild_table(&model.table, &desired).await?;
            finish(&result, cli.json)?;
        }

        Commands::CleanupBackups {
            table,
            retention_days,
        } => {
            let retention = chrono::Duration::days(i64::from(retention_days));
            let dropped = executor.cleanup_backups(&table, retention).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&dropped)?);
            } else if dropped.is_empty() {
                info!(table = %table, "No expired backups");
            } else {
                for name in dropped {
                    println!("dropped {name}");
                }
            }
        }
    }

    Ok(())
}

fn load_model(path: &Path) -> anyhow::Result<TableModel> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading model {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing model {}", path.display()))
}

fn print_columns(dialect: Dialect, table: &str, columns: &[ColumnSpec]) {
    let strategy = dialect.strategy();
    println!("\n{table} ({dialect}):");
    println!("{:-<60}", "");
    for column in columns {
        println!(
            "  {:<24} {}",
            column.name,
            strategy.column_definition(column, true)
        );
    }
    println!();
}

fn print_statements(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

fn finish(result: &ReconciliationResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.dry_run {
        print_statements(&result.statements);
    }

    if !result.success {
        bail!(
            "reconciliation of {} failed: {}",
            result.table,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

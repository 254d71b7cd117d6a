//! Connection and transaction boundary.
//!
//! One pool type per supported driver, selected from the connection URL.
//! Everything above this module works with [`DatabasePool`] and
//! [`DatabaseTransaction`] and never names a concrete driver.

use oxide_reconcile_core::{Dialect, DialectError};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use tracing::info;

use crate::error::{ReconcileError, Result};

/// Maximum connections for server databases.
const SERVER_POOL_SIZE: u32 = 5;

/// A connection pool for one of the supported drivers.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl DatabasePool {
    /// Connects to `url`, selecting the driver from its scheme.
    ///
    /// SQLite pools hold a single connection so that `sqlite::memory:`
    /// databases survive between statements.
    pub async fn connect(url: &str) -> Result<Self> {
        let dialect = Dialect::from_url(url).map_err(|e| match e {
            DialectError::Unsupported(scheme) => ReconcileError::UnsupportedDriver(scheme),
        })?;
        info!(dialect = %dialect, "Connecting to database");

        let pool = match dialect {
            Dialect::Sqlite => Self::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(url)
                    .await?,
            ),
            Dialect::Postgres => Self::Postgres(
                PgPoolOptions::new()
                    .max_connections(SERVER_POOL_SIZE)
                    .connect(url)
                    .await?,
            ),
            Dialect::MySql => Self::MySql(
                MySqlPoolOptions::new()
                    .max_connections(SERVER_POOL_SIZE)
                    .connect(url)
                    .await?,
            ),
        };
        Ok(pool)
    }

    /// Returns the dialect of this pool.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::Postgres(_) => Dialect::Postgres,
            Self::MySql(_) => Dialect::MySql,
        }
    }

    /// Executes one statement outside any transaction. Returns the number
    /// of affected rows.
    pub async fn execute(&self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        let affected = match self {
            Self::Sqlite(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
            Self::Postgres(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
            Self::MySql(pool) => sqlx::query(sql).execute(pool).await?.rows_affected(),
        };
        Ok(affected)
    }

    /// Opens a transaction.
    pub async fn begin(&self) -> std::result::Result<DatabaseTransaction, sqlx::Error> {
        let tx = match self {
            Self::Sqlite(pool) => DatabaseTransaction::Sqlite(pool.begin().await?),
            Self::Postgres(pool) => DatabaseTransaction::Postgres(pool.begin().await?),
            Self::MySql(pool) => DatabaseTransaction::MySql(pool.begin().await?),
        };
        Ok(tx)
    }
}

impl From<SqlitePool> for DatabasePool {
    fn from(pool: SqlitePool) -> Self {
        Self::Sqlite(pool)
    }
}

impl From<PgPool> for DatabasePool {
    fn from(pool: PgPool) -> Self {
        Self::Postgres(pool)
    }
}

impl From<MySqlPool> for DatabasePool {
    fn from(pool: MySqlPool) -> Self {
        Self::MySql(pool)
    }
}

/// An open transaction on one of the supported drivers.
///
/// Dropping it without calling [`commit`](Self::commit) rolls it back.
#[derive(Debug)]
pub enum DatabaseTransaction {
    Sqlite(Transaction<'static, Sqlite>),
    Postgres(Transaction<'static, Postgres>),
    MySql(Transaction<'static, MySql>),
}

impl DatabaseTransaction {
    /// Executes one statement inside the transaction.
    pub async fn execute(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        let affected = match self {
            Self::Sqlite(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            Self::Postgres(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
            Self::MySql(tx) => sqlx::query(sql).execute(&mut **tx).await?.rows_affected(),
        };
        Ok(affected)
    }

    /// Commits the transaction.
    pub async fn commit(self) -> std::result::Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(tx) => tx.commit().await,
            Self::Postgres(tx) => tx.commit().await,
            Self::MySql(tx) => tx.commit().await,
        }
    }

    /// Rolls the transaction back.
    pub async fn rollback(self) -> std::result::Result<(), sqlx::Error> {
        match self {
            Self::Sqlite(tx) => tx.rollback().await,
            Self::Postgres(tx) => tx.rollback().await,
            Self::MySql(tx) => tx.rollback().await,
        }
    }
}

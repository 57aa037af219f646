//! Shared `SQLite` helpers.
//!
//! Provides `DatabaseError`, pool creation, `unix_timestamp()` and the
//! `define_database!` macro used by the gateway storage layer.

use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

fn connect_options(url: &str) -> Result<SqliteConnectOptions, DatabaseError> {
    Ok(SqliteConnectOptions::from_str(url)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT))
}

/// Open (or create) a WAL-mode pool at `path`, creating parent directories.
pub async fn open_pool(path: &Path) -> Result<Pool<Sqlite>, DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io(e.to_string()))?;
    }

    let options = connect_options(&format!("sqlite:{}?mode=rwc", path.display()))?
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    info!(path = %path.display(), "Database opened");
    Ok(pool)
}

/// Open an in-memory pool. A single connection keeps the database alive.
pub async fn open_pool_in_memory() -> Result<Pool<Sqlite>, DatabaseError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options("sqlite::memory:")?)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))
}

/// Current time as seconds since the Unix epoch.
#[allow(clippy::cast_possible_wrap)]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Define a database handle with `open`, `open_in_memory` and `pool`.
///
/// Migrations are embedded from the calling crate's `./migrations`
/// directory and run on open.
///
/// ```ignore
/// hubwire_core::define_database!(GatewayDatabase, "Gateway database migrations complete");
/// ```
#[macro_export]
macro_rules! define_database {
    ($name:ident, $migration_msg:expr) => {
        #[derive(Clone)]
        pub struct $name {
            pool: ::sqlx::Pool<::sqlx::Sqlite>,
        }

        impl $name {
            /// Open or create a database at the given path.
            pub async fn open(
                path: &::std::path::Path,
            ) -> ::std::result::Result<Self, $crate::db::DatabaseError> {
                let db = Self {
                    pool: $crate::db::open_pool(path).await?,
                };
                db.run_migrations().await?;
                Ok(db)
            }

            /// Open a migrated in-memory database.
            pub async fn open_in_memory() -> ::std::result::Result<Self, $crate::db::DatabaseError>
            {
                let db = Self {
                    pool: $crate::db::open_pool_in_memory().await?,
                };
                db.run_migrations().await?;
                Ok(db)
            }

            async fn run_migrations(&self) -> ::std::result::Result<(), $crate::db::DatabaseError> {
                ::sqlx::migrate!("./migrations")
                    .run(&self.pool)
                    .await
                    .map_err(|e| $crate::db::DatabaseError::Migration(e.to_string()))?;
                ::tracing::debug!($migration_msg);
                Ok(())
            }

            pub const fn pool(&self) -> &::sqlx::Pool<::sqlx::Sqlite> {
                &self.pool
            }
        }
    };
}

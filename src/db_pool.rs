use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::db_schema::initialize_schema;

pub type DbPool = sqlx::SqlitePool;

pub async fn create_db_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    // WAL with a busy timeout so concurrent writers wait instead of failing immediately.
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Process-wide database handle that connects on first use.
///
/// Concurrent first callers share one connection attempt. A failed attempt is
/// not cached, so the next caller tries again.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    url: String,
    pool: OnceCell<DbPool>,
}

impl Database {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                url: url.into(),
                pool: OnceCell::new(),
            }),
        }
    }

    pub async fn pool(&self) -> Result<&DbPool, sqlx::Error> {
        self.inner
            .pool
            .get_or_try_init(|| async {
                let pool = create_db_pool(&self.inner.url).await?;
                info!("Connected to database {}", self.inner.url);
                Ok(pool)
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.inner.pool.initialized()
    }

    pub async fn close(&self) {
        if let Some(pool) = self.inner.pool.get() {
            pool.close().await;
            info!("Database connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("nested/test.db").display());
        let database = Database::new(url);

        assert!(!database.is_connected());

        let first = database.pool().await.unwrap() as *const DbPool;
        let second = database.pool().await.unwrap() as *const DbPool;

        assert!(database.is_connected());
        assert_eq!(first, second);
        assert!(dir.path().join("nested/test.db").exists());
    }

    #[tokio::test]
    async fn test_failed_connection_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let url = format!("sqlite://{}", blocker.join("test.db").display());
        let database = Database::new(url);

        assert!(database.pool().await.is_err());
        assert!(!database.is_connected());
        assert!(database.pool().await.is_err());
    }
}

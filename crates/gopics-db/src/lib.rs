pub mod kv;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod timeline;
pub mod users;

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

pub use pool::{Pool, PoolConfig, PooledConn};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("timed out waiting for a store connection")]
    PoolTimeout,
    #[error("store connection pool is closed")]
    PoolClosed,
    #[error("user {0} already exists")]
    NameTaken(String),
    #[error("key {0} already exists")]
    DuplicateKey(String),
    #[error("index references missing record {0}")]
    Inconsistent(String),
    #[error("malformed record {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Handle to the key-value store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool>,
}

impl Database {
    pub fn open(path: &Path, config: PoolConfig) -> Result<Self> {
        let pool = Arc::new(Pool::new(path, config));

        let conn = pool.dial()?;
        migrations::run(&conn)?;
        pool.put_back(conn);

        info!("Database opened at {}", path.display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Run `f` on a pooled connection off the async runtime.
    ///
    /// Waits for a free slot according to the pool's wait policy. The
    /// connection goes back to the pool when `f` returns, whatever the result.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.pool.acquire().await?;
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.checkout(permit)?;
            f(&mut conn)
        })
        .await?
    }
}

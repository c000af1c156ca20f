use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::{DbError, Result};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections kept open while nobody uses them.
    pub max_idle: usize,
    /// Connections checked out at the same time.
    pub max_open: usize,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Duration,
    /// How long a task waits for a free slot. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 3,
            max_open: 16,
            idle_timeout: Duration::from_secs(240),
            wait_timeout: Some(Duration::from_secs(5)),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

struct IdleConn {
    conn: Connection,
    returned_at: Instant,
}

/// Bounded pool of SQLite connections.
///
/// `max_open` slots are handed out through a semaphore; a task that finds
/// none free waits up to `wait_timeout`. Idle connections are probed with
/// `SELECT 1` before reuse.
pub struct Pool {
    path: PathBuf,
    config: PoolConfig,
    idle: Mutex<Vec<IdleConn>>,
    slots: Arc<Semaphore>,
}

/// A reserved slot, not yet bound to a connection.
pub struct Permit(OwnedSemaphorePermit);

/// A checked-out connection. Dropping it returns the connection and frees
/// the slot.
pub struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
}

impl Pool {
    pub fn new(path: &Path, config: PoolConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_open.max(1)));
        Self {
            path: path.to_path_buf(),
            config,
            idle: Mutex::new(Vec::new()),
            slots,
        }
    }

    /// Reserve a slot, waiting according to the pool's wait policy.
    pub async fn acquire(&self) -> Result<Permit> {
        let slots = Arc::clone(&self.slots);
        let permit = match self.config.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, slots.acquire_owned())
                .await
                .map_err(|_| {
                    warn!("Store pool exhausted for {:?}", limit);
                    DbError::PoolTimeout
                })?,
            None => slots.acquire_owned().await,
        }
        .map_err(|_| DbError::PoolClosed)?;

        Ok(Permit(permit))
    }

    /// Bind a reserved slot to a live connection. Blocking.
    pub fn checkout(self: &Arc<Self>, permit: Permit) -> Result<PooledConn> {
        let conn = match self.take_idle() {
            Some(conn) => conn,
            None => self.dial()?,
        };

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit.0,
        })
    }

    /// `acquire` followed by `checkout`.
    #[cfg(test)]
    pub async fn get(self: &Arc<Self>) -> Result<PooledConn> {
        let permit = self.acquire().await?;
        self.checkout(permit)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    pub(crate) fn dial(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(self.config.busy_timeout)?;
        Ok(conn)
    }

    pub(crate) fn put_back(&self, conn: Connection) {
        let Ok(mut idle) = self.idle.lock() else {
            return;
        };
        if idle.len() < self.config.max_idle {
            idle.push(IdleConn {
                conn,
                returned_at: Instant::now(),
            });
        }
    }

    fn take_idle(&self) -> Option<Connection> {
        loop {
            let entry = self.idle.lock().ok()?.pop()?;

            if entry.returned_at.elapsed() >= self.config.idle_timeout {
                debug!("Closing idle store connection past its timeout");
                continue;
            }
            if let Err(e) = ping(&entry.conn) {
                warn!("Discarding store connection that failed liveness probe: {}", e);
                continue;
            }
            return Some(entry.conn);
        }
    }
}

fn ping(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(()))
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("pooled connection is present until drop")
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

//! Fixed-size SQLite connection pool.
//!
//! # Responsibility
//! - Keep a bounded set of bootstrapped connections.
//! - Lend one connection per request and bind it to the request context.
//!
//! # Invariants
//! - Every pooled connection was opened through `open_db*`, so migrations are
//!   applied and `foreign_keys=ON`.
//! - In-memory pools hold exactly one connection (each in-memory connection
//!   is a separate database).
//! - A connection returns to the idle queue with no context attached.

use super::open::{open_db_with_busy_timeout, DEFAULT_BUSY_TIMEOUT};
use super::{open_db_in_memory, DbError, DbResult};
use crate::context::RequestContext;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use rusqlite::Connection;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pool sizing and wait budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of connections opened eagerly.
    pub size: usize,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout: Duration,
    /// Longest wait for a free connection when the request has no earlier
    /// deadline.
    pub checkout_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 4,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            checkout_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct PoolInner {
    idle_tx: Sender<Connection>,
    idle_rx: Receiver<Connection>,
    size: usize,
    checkout_timeout: Duration,
}

impl PoolInner {
    fn release(&self, conn: Connection) {
        RequestContext::detach(&conn);
        if self.idle_tx.send(conn).is_err() {
            warn!("event=pool_release module=db status=error error_code=pool_closed");
        }
    }
}

/// Shared handle to a fixed set of SQLite connections.
///
/// Cloning is cheap; all clones lend from the same idle queue.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: Arc<PoolInner>,
}

impl DbPool {
    /// Opens `options.size` connections to the database file at `path`.
    pub fn open(path: impl AsRef<Path>, options: &PoolOptions) -> DbResult<Self> {
        if options.size == 0 {
            return Err(DbError::InvalidPoolSize(0));
        }

        let mut connections = Vec::with_capacity(options.size);
        for _ in 0..options.size {
            connections.push(open_db_with_busy_timeout(
                path.as_ref(),
                options.busy_timeout,
            )?);
        }
        Ok(Self::from_connections(connections, options.checkout_timeout))
    }

    /// Opens a single-connection pool over a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        Ok(Self::from_connections(
            vec![conn],
            PoolOptions::default().checkout_timeout,
        ))
    }

    fn from_connections(connections: Vec<Connection>, checkout_timeout: Duration) -> Self {
        let size = connections.len();
        let (idle_tx, idle_rx) = bounded(size);
        let inner = PoolInner {
            idle_tx,
            idle_rx,
            size,
            checkout_timeout,
        };
        for conn in connections {
            inner.release(conn);
        }
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Total number of connections owned by the pool.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Number of connections currently idle.
    pub fn idle(&self) -> usize {
        self.inner.idle_rx.len()
    }

    /// Borrows one connection bound to `ctx`.
    ///
    /// Waits at most the pool checkout timeout, shortened to the request
    /// deadline when that comes first.
    pub fn get(&self, ctx: &RequestContext) -> DbResult<PooledConnection> {
        let started_at = Instant::now();
        let wait = match ctx.remaining() {
            Some(remaining) => remaining.min(self.inner.checkout_timeout),
            None => self.inner.checkout_timeout,
        };

        match self.inner.idle_rx.recv_timeout(wait) {
            Ok(conn) => {
                ctx.attach(&conn);
                debug!(
                    "event=pool_checkout module=db status=ok wait_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(&self.inner),
                })
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                let waited_ms = started_at.elapsed().as_millis();
                warn!(
                    "event=pool_checkout module=db status=error wait_ms={} error_code=pool_timeout",
                    waited_ms
                );
                Err(DbError::PoolTimeout { waited_ms })
            }
        }
    }
}

/// Connection on loan from a [`DbPool`]; returns itself on drop.
#[derive(Debug)]
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DbPool, PoolOptions};
    use crate::context::RequestContext;
    use crate::db::DbError;
    use std::time::Duration;

    #[test]
    fn in_memory_pool_lends_single_connection_and_reclaims_it() {
        let pool = DbPool::open_in_memory().unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.idle(), 1);

        let ctx = RequestContext::background();
        {
            let conn = pool.get(&ctx).unwrap();
            assert_eq!(pool.idle(), 0);
            let fk: i64 = conn
                .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(fk, 1);
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn exhausted_pool_times_out_at_request_deadline() {
        let pool = DbPool::open_in_memory().unwrap();
        let holder = pool.get(&RequestContext::background()).unwrap();

        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        let err = pool.get(&ctx).unwrap_err();
        assert!(matches!(err, DbError::PoolTimeout { .. }));
        drop(holder);
    }

    #[test]
    fn file_pool_opens_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let options = PoolOptions {
            size: 3,
            ..PoolOptions::default()
        };
        let pool = DbPool::open(dir.path().join("catalog.db"), &options).unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.idle(), 3);
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let options = PoolOptions {
            size: 0,
            ..PoolOptions::default()
        };
        let err = DbPool::open(dir.path().join("catalog.db"), &options).unwrap_err();
        assert!(matches!(err, DbError::InvalidPoolSize(0)));
    }
}

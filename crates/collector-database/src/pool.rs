//! Connection pool backing the event store.
//!
//! Uses r2d2 and SQLite WAL mode: each producer thread appends through its
//! own connection, readers never block writers, and write transactions are
//! serialized by SQLite with a busy timeout instead of failing outright.

use crate::{migrations, queries, DatabaseError, DatabaseResult, EventStore, PendingEvent};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the database pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum connections in the pool.
    pub max_size: u32,
    /// Minimum idle connections to maintain.
    pub min_idle: Option<u32>,
    /// Connection acquisition timeout.
    pub connection_timeout: Duration,
    /// How long a statement waits on SQLite's write lock.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: Some(2),
            connection_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Thread-safe pending-event store.
pub struct DatabasePool {
    pool: Pool<SqliteConnectionManager>,
    path: String,
    /// Set once the table has been seen; cleared by [`teardown`](Self::teardown).
    ready: AtomicBool,
}

impl DatabasePool {
    /// Open a pool on the database at `path`.
    ///
    /// Creates the file and its parent directory if needed but does not
    /// create the schema; call [`provision`](Self::provision) for that.
    pub fn open(path: &Path, config: PoolConfig) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        let busy_timeout = config.busy_timeout;

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            // Before the pragmas: switching to WAL takes a lock of its own.
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA temp_store = MEMORY;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        info!(
            path = %path_str,
            max_size = config.max_size,
            "Database pool created"
        );

        Ok(Self {
            pool,
            path: path_str,
            ready: AtomicBool::new(false),
        })
    }

    /// Get a connection from the pool.
    ///
    /// Blocks until a connection is available or the timeout is reached.
    pub fn get(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))
    }

    /// Create the pending-event schema.
    pub fn provision(&self) -> DatabaseResult<()> {
        let conn = self.get()?;
        migrations::run_migrations(&conn)?;
        self.ready.store(true, Ordering::Release);
        info!(path = %self.path, "Event store provisioned");
        Ok(())
    }

    /// Drop the pending-event schema. Pending rows are lost.
    pub fn teardown(&self) -> DatabaseResult<()> {
        self.ready.store(false, Ordering::Release);
        let conn = self.get()?;
        migrations::teardown_schema(&conn)?;
        info!(path = %self.path, "Event store torn down");
        Ok(())
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn check_table(&self) -> DatabaseResult<bool> {
        let conn = self.get()?;
        queries::table_exists(&conn, queries::PENDING_EVENTS_TABLE)
    }
}

impl EventStore for DatabasePool {
    fn is_ready(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return true;
        }

        match self.check_table() {
            Ok(true) => {
                self.ready.store(true, Ordering::Release);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "Event store readiness check failed");
                false
            }
        }
    }

    fn append(&self, payload: &str) -> DatabaseResult<i64> {
        if !self.is_ready() {
            return Err(DatabaseError::NotReady);
        }
        let conn = self.get()?;
        let id = queries::insert_pending_event(&conn, payload)?;
        debug!(id, "Appended pending event");
        Ok(id)
    }

    fn claim_and_remove(&self) -> DatabaseResult<Vec<PendingEvent>> {
        if !self.is_ready() {
            return Err(DatabaseError::NotReady);
        }
        let mut conn = self.get()?;
        queries::claim_and_remove_pending_events(&mut conn)
    }

    fn pending_count(&self) -> DatabaseResult<usize> {
        if !self.is_ready() {
            return Err(DatabaseError::NotReady);
        }
        let conn = self.get()?;
        queries::count_pending_events(&conn)
    }
}

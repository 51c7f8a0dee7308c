//! Per-name request counter backed by SQLite.
//!
//! - One `stats(name, count)` table.
//! - Every increment is one `BEGIN IMMEDIATE` transaction around a single
//!   upsert, so two writers for the same name can never read the same prior
//!   count.
//! - `:memory:` databases live inside one connection, so their pool is pinned
//!   to a single connection that is never recycled.

use std::path::PathBuf;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OptionalExtension, TransactionBehavior};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::debug;

use crate::error::{HitError, Result};

pub use r2d2_sqlite::rusqlite::InterruptHandle;

const CREATE_STATS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS stats (name TEXT PRIMARY KEY, count INTEGER)";

const UPSERT_INCREMENT: &str = "INSERT INTO stats (name, count) VALUES (?1, 1)
     ON CONFLICT(name) DO UPDATE SET count = count + 1
     RETURNING count";

const SELECT_COUNT: &str = "SELECT count FROM stats WHERE name = ?1";

/// Where the counter table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePath {
    Memory,
    File(PathBuf),
}

impl StorePath {
    pub fn parse(s: &str) -> Self {
        match s {
            ":memory:" => StorePath::Memory,
            other => StorePath::File(PathBuf::from(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: StorePath,
    /// Ignored for `StorePath::Memory`.
    pub pool_size: u32,
    pub busy_timeout: Duration,
    /// How long a checkout waits for a free or freshly opened connection.
    pub connect_timeout: Duration,
}

impl StoreOptions {
    pub fn memory() -> Self {
        Self {
            path: StorePath::Memory,
            pool_size: 1,
            busy_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: StorePath::File(path.into()),
            pool_size: 8,
            busy_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::memory()
    }
}

/// Shared handle to the counter table. Cheap to clone.
#[derive(Clone)]
pub struct CounterDb {
    pool: Pool<SqliteConnectionManager>,
}

impl CounterDb {
    /// Open the pool and create the `stats` table if it is missing.
    pub fn open(opts: &StoreOptions) -> Result<Self> {
        let pool = match &opts.path {
            StorePath::Memory => Pool::builder()
                .max_size(1)
                .connection_timeout(opts.connect_timeout)
                .max_lifetime(None)
                .idle_timeout(None)
                .build(SqliteConnectionManager::memory())?,
            StorePath::File(path) => {
                let busy_timeout = opts.busy_timeout;
                let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
                    conn.busy_timeout(busy_timeout)?;
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                        row.get::<_, String>(0)
                    })?;
                    Ok(())
                });
                Pool::builder()
                    .max_size(opts.pool_size.max(1))
                    .connection_timeout(opts.connect_timeout)
                    .build(manager)?
            }
        };

        let conn = pool.get()?;
        conn.execute(CREATE_STATS_TABLE, [])?;
        debug!(path = ?opts.path, pool_size = pool.max_size(), "counter store opened");

        Ok(Self { pool })
    }

    /// Check a connection out of the pool.
    pub fn checkout(&self) -> Result<CounterConn> {
        Ok(CounterConn { conn: self.pool.get()? })
    }

    /// Increment the counter for `name` and return the committed value.
    pub fn increment_and_get(&self, name: &str) -> Result<i64> {
        self.checkout()?.increment_and_get(name)
    }

    /// Current count for `name`, `None` if it was never incremented.
    pub fn count(&self, name: &str) -> Result<Option<i64>> {
        self.checkout()?.count(name)
    }
}

/// A pooled connection with the counter operations on it.
pub struct CounterConn {
    conn: PooledConnection<SqliteConnectionManager>,
}

impl CounterConn {
    /// Handle that aborts whatever statement this connection is running.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    pub fn increment_and_get(&mut self, name: &str) -> Result<i64> {
        self.increment_unless(name, || false)
    }

    /// Increment, but roll back with `Interrupted` instead of committing if
    /// `abandoned()` is true once the upsert has run.
    ///
    /// Dropping the transaction without commit rolls it back, so every early
    /// return below leaves the table untouched.
    pub fn increment_unless(&mut self, name: &str, abandoned: impl Fn() -> bool) -> Result<i64> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let count: i64 = tx.query_row(UPSERT_INCREMENT, params![name], |row| row.get(0))?;
        if abandoned() {
            debug!(name, "caller gone before commit, rolling back");
            return Err(HitError::Interrupted);
        }
        tx.commit()?;

        debug!(name, count, "request count updated");
        Ok(count)
    }

    pub fn count(&self, name: &str) -> Result<Option<i64>> {
        let count = self
            .conn
            .query_row(SELECT_COUNT, params![name], |row| row.get(0))
            .optional()?;
        Ok(count)
    }
}

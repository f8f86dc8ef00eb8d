//! Scoped `DuckDB` connection pool.
//!
//! The database file is opened once per pool; every further connection is a
//! clone of that root handle so all of them share one `DuckDB` instance.
//! Connections are handed out as [`PooledConnection`] guards and parked again
//! when the guard drops. Readers and writers are parked separately.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

/// Access mode requested for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    fn slot(self) -> usize {
        match self {
            Self::ReadOnly => 0,
            Self::ReadWrite => 1,
        }
    }
}

struct PoolShared {
    db_path: PathBuf,
    max_idle: usize,
    root: Mutex<Option<Connection>>,
    idle: Mutex<[Vec<Connection>; 2]>,
}

/// Pool of connections to a single warehouse file.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Creates a pool for `path` keeping at most `max_pool_size` idle
    /// connections per access mode (minimum one).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_pool_size: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db_path: path.into(),
                max_idle: max_pool_size.max(1),
                root: Mutex::new(None),
                idle: Mutex::new([Vec::new(), Vec::new()]),
            }),
        }
    }

    /// Takes an idle connection for `mode`, or opens a new one.
    ///
    /// # Errors
    /// Returns the `DuckDB` error when the database file cannot be opened or
    /// the session settings cannot be applied.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let parked = self
            .shared
            .idle
            .lock()
            .expect("warehouse pool mutex poisoned")[mode.slot()]
        .pop();

        let connection = match parked {
            Some(connection) => connection,
            None => self.open_connection()?,
        };

        Ok(PooledConnection {
            mode,
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    /// Number of parked connections for `mode`.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    #[must_use]
    pub fn idle_count(&self, mode: AccessMode) -> usize {
        self.shared
            .idle
            .lock()
            .expect("warehouse pool mutex poisoned")[mode.slot()]
        .len()
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.shared.db_path.as_path()
    }

    fn open_connection(&self) -> Result<Connection, ::duckdb::Error> {
        let mut root = self
            .shared
            .root
            .lock()
            .expect("warehouse pool mutex poisoned");
        let connection = match root.as_ref() {
            Some(existing) => existing.try_clone()?,
            None => {
                let opened = Connection::open(self.shared.db_path.as_path())?;
                let clone = opened.try_clone()?;
                *root = Some(opened);
                clone
            }
        };
        drop(root);

        configure_connection(&connection)?;
        Ok(connection)
    }
}

/// A borrowed connection that goes back to its pool on drop.
pub struct PooledConnection {
    mode: AccessMode,
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl PooledConnection {
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection used after release")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection used after release")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let Ok(mut idle) = self.shared.idle.lock() else {
            return;
        };
        let parked = &mut idle[self.mode.slot()];
        if parked.len() < self.shared.max_idle {
            parked.push(connection);
        }
    }
}

// Access mode is instance-wide in DuckDB, so readers are only separated by
// pool slot; the query layer never hands them a write statement.
fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}

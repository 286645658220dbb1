//! Shared SQLite storage utilities.
//!
//! This module owns the single connection every store in the crate goes
//! through. It contains no domain logic beyond running the schema bootstrap
//! when a database is opened.
//!
//! ## Key Features
//!
//! - Configurable pragmas with sensible defaults
//! - One connection behind a mutex, shared by cheap clones of the handle
//! - Closure-based access for plain statements and for transactions

use crate::error::{QbrackError, Result};
use crate::storage::schema;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, trace};

// =============================================================================
// SQLite Configuration
// =============================================================================

/// Configuration for an SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Value for `PRAGMA journal_mode`.
    pub journal_mode: String,
    /// Value for `PRAGMA synchronous`.
    pub synchronous: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
        }
    }
}

impl SqliteConfig {
    /// Creates a configuration for throwaway databases.
    ///
    /// Keeps the journal in memory and skips fsync.
    pub fn for_tests() -> Self {
        Self {
            busy_timeout: Duration::from_millis(500),
            journal_mode: "MEMORY".to_string(),
            synchronous: "OFF".to_string(),
        }
    }

    fn apply(&self, conn: &Connection) -> Result<()> {
        conn.busy_timeout(self.busy_timeout)?;
        // journal_mode returns a row, so it cannot go through execute_batch
        let mode: String =
            conn.query_row(&format!("PRAGMA journal_mode={}", self.journal_mode), [], |row| {
                row.get(0)
            })?;
        conn.execute_batch(&format!(
            "PRAGMA synchronous={}; PRAGMA foreign_keys=ON; PRAGMA temp_store=MEMORY;",
            self.synchronous
        ))?;
        debug!(journal_mode = %mode, synchronous = %self.synchronous, "sqlite pragmas applied");
        Ok(())
    }
}

// =============================================================================
// Database Handle Wrapper
// =============================================================================

/// A cloneable handle to the application database.
///
/// Stores embed a clone of this handle; all clones share one connection.
#[derive(Clone)]
pub struct SqliteHandle {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHandle").finish_non_exhaustive()
    }
}

impl SqliteHandle {
    /// Opens (or creates) the database at `db_path` and bootstraps the schema.
    pub fn open(db_path: impl AsRef<Path>, config: &SqliteConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path).map_err(|e| {
            QbrackError::storage(format!(
                "Failed to open database {}: {}",
                db_path.display(),
                e
            ))
        })?;
        config.apply(&conn)?;
        schema::bootstrap(&conn)?;
        info!(path = %db_path.display(), "database opened");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database with the schema in place.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        SqliteConfig::for_tests().apply(&conn)?;
        schema::bootstrap(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QbrackError::storage("Database connection lock poisoned"))
    }

    /// Runs `f` with the connection.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        trace!("with_conn: connection acquired");
        f(&conn)
    }

    /// Runs `f` inside a transaction, committing when it returns `Ok`.
    ///
    /// The transaction rolls back on drop if `f` fails.
    pub fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        trace!("with_tx: transaction committed");
        Ok(value)
    }
}

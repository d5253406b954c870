/// Store Handle Module
///
/// This module provides the store handle: a caller-owned session object
/// wrapping the embedded engine connection. The handle moves through a
/// strict lifecycle, `Closed -> Open -> Closed`, and the closed state is
/// terminal. There is no global connection state; the handle is threaded
/// explicitly through every data-access call.

use crate::core::db::query;
use crate::core::{DalError, Result};
use rusqlite::{Connection, Transaction};
use tracing::{debug, warn};

/// Session-level engine options applied when a store is opened.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Enforce referential constraints (PRAGMA foreign_keys)
    pub foreign_keys: bool,
    /// Journal mode for file stores (PRAGMA journal_mode)
    pub journal_mode: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            foreign_keys: true,
            journal_mode: "WAL".to_string(),
        }
    }
}

/// A live session with the embedded database.
///
/// All data-access operations require the handle to be open; once
/// `close` has been called, every subsequent operation (including a
/// second `close`) fails with `DalError::UseAfterClose`.
#[derive(Debug)]
pub struct Store {
    /// Active engine connection (None once closed)
    conn: Option<Connection>,
    /// Path to the database file (None for in-memory stores)
    path: Option<String>,
}

impl Store {
    /// Opens a store backed by the database file at `db_path`, with the
    /// default session options (foreign keys enforced, WAL journaling).
    pub fn open(db_path: &str) -> Result<Self> {
        Store::open_with(db_path, &SessionOptions::default())
    }

    /// Opens a store with explicit session options.
    ///
    /// The journal mode name is validated as a bare identifier before it
    /// reaches the pragma statement; the engine rejects unknown modes.
    pub fn open_with(db_path: &str, options: &SessionOptions) -> Result<Self> {
        query::check_identifier(&options.journal_mode)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = {};
             PRAGMA journal_mode = {};",
            if options.foreign_keys { "ON" } else { "OFF" },
            options.journal_mode,
        ))?;
        debug!(path = db_path, ?options, "opened store");

        Ok(Store {
            conn: Some(conn),
            path: Some(db_path.to_string()),
        })
    }

    /// Opens an in-memory store. Used mainly by tests; the schema and
    /// data vanish when the handle is closed or dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Store {
            conn: Some(conn),
            path: None,
        })
    }

    /// Returns the live connection, or `UseAfterClose` once closed.
    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(DalError::UseAfterClose)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(DalError::UseAfterClose)
    }

    /// Whether the handle is still in the `Open` state.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Path of the backing database file, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Runs `work` as one atomic unit.
    ///
    /// All writes performed through the transaction commit together when
    /// `work` returns `Ok`; on `Err` the transaction is rolled back and
    /// the error is returned to the caller with the engine's cause
    /// intact. No partial effects remain visible after a failed unit.
    pub fn run_transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let conn = self.conn_mut()?;
        let tx = conn.transaction().map_err(DalError::from_engine)?;

        match work(&tx) {
            Ok(value) => {
                tx.commit().map_err(DalError::from_engine)?;
                Ok(value)
            }
            Err(err) => {
                // Dropping the transaction would also roll back; doing it
                // explicitly lets a rollback failure surface in the logs.
                if let Err(rb_err) = tx.rollback() {
                    warn!("rollback failed: {rb_err}");
                }
                Err(err)
            }
        }
    }

    /// Releases the store handle.
    ///
    /// All prior writes are already durable at this point (every mutation
    /// commits at its own batch or transaction boundary), so close cannot
    /// roll anything back. Closing an already-closed handle reports
    /// `UseAfterClose`. A close that fails in the engine is also terminal:
    /// the handle stays `Closed` and the error cannot be retried.
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(DalError::UseAfterClose)?;
        conn.close().map_err(|(_, err)| DalError::Database(err))?;
        debug!(path = self.path.as_deref(), "closed store");
        Ok(())
    }
}

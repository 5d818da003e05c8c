//! SQLite task and notification storage.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so several sessions can read while one writes
//! - `busy_timeout = 5s` to ride out short write contention between sessions
//! - `foreign_keys = ON`

pub mod migrations;
pub mod notifications;
pub mod schema;
pub mod tasks;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

pub use notifications::NotificationFilter;

/// Busy timeout used for database connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the SQLite database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::upgrade(&mut conn).context("upgrade task database schema")?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Task repository and notification sink over one SQLite connection.
///
/// Each session opens its own backend; sessions coordinate only through the
/// conditional escalation update.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        open_database(path).map(Self::new)
    }

    /// An in-memory, fully migrated backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrations::upgrade(&mut conn).context("upgrade task database schema")?;
        Ok(Self::new(conn))
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(id: &str, micros: i64) -> Result<DateTime<Utc>, crate::error::StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| crate::error::StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("timestamp {micros} out of range"),
    })
}

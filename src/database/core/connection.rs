//! Database connection management
//!
//! This module provides the SQLite connection wrapper used by the persistence context.

use crate::database::core::connection_string::{OpenMode, SqliteConnectionString};
use crate::error::{CrmError, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open the database described by a parsed connection string
    pub fn open(cs: &SqliteConnectionString) -> Result<Self> {
        for (key, _) in &cs.unrecognized {
            warn!("ignoring connection string key '{}' (not supported by sqlite)", key);
        }

        let conn = if cs.is_in_memory() {
            debug!("opening in-memory database");
            Connection::open_in_memory().map_err(|source| CrmError::Connection {
                target: "in-memory database".to_string(),
                source,
            })?
        } else {
            let path = cs.data_source.as_deref().ok_or_else(|| {
                CrmError::InvalidConnectionString(
                    "no 'Data Source' specified in connection string".to_string(),
                )
            })?;
            debug!("opening database at '{}' ({})", path, cs.mode);
            Connection::open_with_flags(path, open_flags(cs.mode)).map_err(|source| {
                CrmError::Connection {
                    target: path.to_string(),
                    source,
                }
            })?
        };

        let db = DatabaseConn { conn };
        db.configure(cs)?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&SqliteConnectionString {
            mode: OpenMode::Memory,
            ..Default::default()
        })
    }

    /// Configure the connection
    fn configure(&self, cs: &SqliteConnectionString) -> Result<()> {
        let pragma_error = |source| CrmError::Connection {
            target: cs
                .data_source
                .clone()
                .unwrap_or_else(|| "in-memory database".to_string()),
            source,
        };

        if let Some(timeout) = cs.default_timeout {
            self.conn.busy_timeout(timeout).map_err(pragma_error)?;
        }

        // Read-only handles cannot switch the journal mode
        if cs.mode != OpenMode::ReadOnly && !cs.is_in_memory() {
            let _: String = self
                .conn
                .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
                .map_err(pragma_error)?;
            self.conn
                .execute("PRAGMA synchronous=NORMAL", [])
                .map_err(pragma_error)?;
        }

        self.conn
            .execute("PRAGMA temp_store=MEMORY", [])
            .map_err(pragma_error)?;

        let fk = if cs.foreign_keys { "ON" } else { "OFF" };
        self.conn
            .execute(&format!("PRAGMA foreign_keys={}", fk), [])
            .map_err(pragma_error)?;

        Ok(())
    }

    /// Begin an unchecked transaction
    ///
    /// Staged changes are applied through this so a unit of work commits
    /// or rolls back as a whole.
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(&self.conn, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name);
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

pub(crate) fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn open_flags(mode: OpenMode) -> OpenFlags {
    let base = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match mode {
        OpenMode::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        OpenMode::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::ReadWriteCreate | OpenMode::Memory => {
            base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_file_creates_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crm.db");
        let cs = SqliteConnectionString::parse(&format!("Data Source={}", path.display()))
            .unwrap();

        let db = DatabaseConn::open(&cs).unwrap();
        db.conn
            .execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_read_write_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.db");
        let cs = SqliteConnectionString::parse(&format!(
            "Data Source={};Mode=ReadWrite",
            path.display()
        ))
        .unwrap();

        let err = DatabaseConn::open(&cs).err().unwrap();
        assert!(matches!(err, CrmError::Connection { .. }));
    }

    #[test]
    fn test_missing_data_source() {
        let cs = SqliteConnectionString::parse("Server=x").unwrap();
        let err = DatabaseConn::open(&cs).err().unwrap();
        assert!(matches!(err, CrmError::InvalidConnectionString(_)));
    }

    #[test]
    fn test_foreign_keys_flag() {
        let cs = SqliteConnectionString::parse("Data Source=:memory:;Foreign Keys=false")
            .unwrap();
        let db = DatabaseConn::open(&cs).unwrap();
        let fk: i32 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 0);
    }

    #[test]
    fn test_table_exists_and_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.conn
            .execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        db.conn
            .execute("INSERT INTO test_table (id) VALUES (1), (2), (3)", [])
            .unwrap();

        assert!(db.table_exists("test_table").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
        assert_eq!(db.table_count("test_table").unwrap(), 3);
    }
}

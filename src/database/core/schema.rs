//! Database schema management
//!
//! The schema is assembled from independent [`SchemaModule`]s. Each module
//! owns its tables and indexes and carries its own version, recorded in the
//! `__schema_meta` table. Modules are combined when the schema is built.

use crate::database::core::connection::table_exists;
use crate::error::{CrmError, Result};
use rusqlite::Connection;
use tracing::info;

/// Name of the table tracking module versions and other metadata
pub const META_TABLE_NAME: &str = "__schema_meta";

const META_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS __schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
    );
"#;

/// A separately-versioned group of tables
pub trait SchemaModule {
    /// Stable module name, used as the version key
    fn name(&self) -> &'static str;

    /// Increment when making breaking changes to the module's tables
    fn version(&self) -> u32;

    /// `(table name, CREATE TABLE statement)` in creation order
    fn tables(&self) -> &'static [(&'static str, &'static str)];

    /// `CREATE INDEX` statements, run after all tables exist
    fn indexes(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Every module is at its current version and all tables exist
    Current,

    /// A module was created by an older version
    NeedsMigration {
        module: String,
        from: u32,
        to: u32,
    },

    /// A module was created by a newer version
    Incompatible {
        module: String,
        database_version: u32,
        required_version: u32,
    },

    /// A module's table is missing
    Corrupted { missing_table: String },
}

/// Schema manager over a set of modules
pub struct SchemaManager<'a> {
    conn: &'a Connection,
    modules: Vec<&'a dyn SchemaModule>,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection and modules
    pub fn new(conn: &'a Connection, modules: Vec<&'a dyn SchemaModule>) -> Self {
        Self { conn, modules }
    }

    /// Initialize the database schema
    ///
    /// Creates all module tables and indexes if they don't exist and records
    /// each module's version.
    /// Everything runs in one transaction, so a failure leaves the database
    /// untouched.
    pub fn initialize(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(META_TABLE, [])?;

        for module in &self.modules {
            info!(
                "initializing schema module '{}' v{}",
                module.name(),
                module.version()
            );
            for (table, sql) in module.tables() {
                tx.execute(sql, []).map_err(|e| {
                    CrmError::Schema(format!("failed to create table {}: {}", table, e))
                })?;
            }
        }

        // Indexes may reference tables of any module
        for module in &self.modules {
            for sql in module.indexes() {
                tx.execute(sql, []).map_err(|e| {
                    CrmError::Schema(format!(
                        "failed to create index for module {}: {}",
                        module.name(),
                        e
                    ))
                })?;
            }
            self.set_meta(&version_key(module.name()), &module.version().to_string())?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Check the current schema status
    ///
    /// Modules are checked in order; the first problem found is reported.
    pub fn check_status(&self) -> Result<SchemaStatus> {
        if !table_exists(self.conn, META_TABLE_NAME)? {
            return Ok(SchemaStatus::NotInitialized);
        }

        for module in &self.modules {
            let Some(version) = self.module_version(module.name())? else {
                return Ok(SchemaStatus::NeedsMigration {
                    module: module.name().to_string(),
                    from: 0,
                    to: module.version(),
                });
            };

            if version < module.version() {
                return Ok(SchemaStatus::NeedsMigration {
                    module: module.name().to_string(),
                    from: version,
                    to: module.version(),
                });
            }
            if version > module.version() {
                return Ok(SchemaStatus::Incompatible {
                    module: module.name().to_string(),
                    database_version: version,
                    required_version: module.version(),
                });
            }

            for (table, _) in module.tables() {
                if !table_exists(self.conn, table)? {
                    return Ok(SchemaStatus::Corrupted {
                        missing_table: table.to_string(),
                    });
                }
            }
        }

        Ok(SchemaStatus::Current)
    }

    /// Recorded version of a module, if any
    pub fn module_version(&self, module: &str) -> Result<Option<u32>> {
        match self.get_meta(&version_key(module))? {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|e| CrmError::Schema(format!("invalid version for {}: {}", module, e))),
            None => Ok(None),
        }
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO __schema_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
            [key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value; `None` before the schema is initialized
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        if !table_exists(self.conn, META_TABLE_NAME)? {
            return Ok(None);
        }
        let result = self.conn.query_row(
            "SELECT value FROM __schema_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reset the database by dropping all module tables
    ///
    /// Tables are dropped in reverse creation order so that dependants go
    /// before the tables they reference.
    pub fn reset(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for module in self.modules.iter().rev() {
            for (table, _) in module.tables().iter().rev() {
                tx.execute(&format!("DROP TABLE IF EXISTS \"{}\"", table), [])?;
            }
        }
        tx.execute(&format!("DROP TABLE IF EXISTS {}", META_TABLE_NAME), [])?;
        tx.commit()?;
        Ok(())
    }

    /// Render the full DDL for all modules as one script
    pub fn script(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("-- {}\n{}\n", META_TABLE_NAME, statement(META_TABLE)));

        for module in &self.modules {
            out.push_str(&format!(
                "\n-- module: {} (v{})\n",
                module.name(),
                module.version()
            ));
            for (_, sql) in module.tables() {
                out.push_str(&statement(sql));
                out.push('\n');
            }
            for sql in module.indexes() {
                out.push_str(&statement(sql));
                out.push('\n');
            }
            out.push_str(&format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES ('{}', '{}');\n",
                META_TABLE_NAME,
                version_key(module.name()),
                module.version()
            ));
        }
        out
    }
}

fn version_key(module: &str) -> String {
    format!("schema_version:{}", module)
}

/// Dedent and terminate a statement with `;`
fn statement(sql: &str) -> String {
    let body = sql
        .trim()
        .trim_end_matches(';')
        .lines()
        .map(|l| l.strip_prefix("    ").unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{};", body)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NotesModule;

    impl SchemaModule for NotesModule {
        fn name(&self) -> &'static str {
            "notes"
        }

        fn version(&self) -> u32 {
            2
        }

        fn tables(&self) -> &'static [(&'static str, &'static str)] {
            &[
                (
                    "notes",
                    "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)",
                ),
                (
                    "note_tags",
                    "CREATE TABLE IF NOT EXISTS note_tags (note_id INTEGER NOT NULL REFERENCES notes(id), tag TEXT NOT NULL)",
                ),
            ]
        }

        fn indexes(&self) -> &'static [&'static str] {
            &["CREATE INDEX IF NOT EXISTS idx_note_tags_tag ON note_tags(tag)"]
        }
    }

    fn modules() -> Vec<&'static dyn SchemaModule> {
        vec![&NotesModule as &dyn SchemaModule]
    }

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys=ON", []).unwrap();
        conn
    }

    #[test]
    fn test_schema_not_initialized() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
    }

    #[test]
    fn test_module_version_before_initialize() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());

        assert_eq!(manager.module_version("notes").unwrap(), None);
        assert_eq!(manager.get_meta("schema_version:notes").unwrap(), None);
        assert!(!table_exists(&conn, META_TABLE_NAME).unwrap());
    }

    struct BrokenIndexModule;

    impl SchemaModule for BrokenIndexModule {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn version(&self) -> u32 {
            1
        }

        fn tables(&self) -> &'static [(&'static str, &'static str)] {
            &[(
                "broken",
                "CREATE TABLE IF NOT EXISTS broken (id INTEGER PRIMARY KEY)",
            )]
        }

        fn indexes(&self) -> &'static [&'static str] {
            &["CREATE INDEX IF NOT EXISTS idx_broken ON broken(no_such_column)"]
        }
    }

    #[test]
    fn test_failed_initialize_leaves_database_untouched() {
        let conn = create_test_db();
        let manager = SchemaManager::new(
            &conn,
            vec![&NotesModule as &dyn SchemaModule, &BrokenIndexModule],
        );

        assert!(matches!(manager.initialize(), Err(CrmError::Schema(_))));
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
        assert!(!table_exists(&conn, "notes").unwrap());
        assert!(!table_exists(&conn, "broken").unwrap());
    }

    #[test]
    fn test_schema_initialize_is_idempotent() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());

        manager.initialize().unwrap();
        manager.initialize().unwrap();

        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert_eq!(manager.module_version("notes").unwrap(), Some(2));
    }

    #[test]
    fn test_schema_needs_migration() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        manager.initialize().unwrap();
        manager.set_meta("schema_version:notes", "1").unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NeedsMigration {
                module: "notes".to_string(),
                from: 1,
                to: 2
            }
        );
    }

    #[test]
    fn test_schema_incompatible() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        manager.initialize().unwrap();
        manager.set_meta("schema_version:notes", "9").unwrap();

        assert!(matches!(
            manager.check_status().unwrap(),
            SchemaStatus::Incompatible {
                database_version: 9,
                ..
            }
        ));
    }

    #[test]
    fn test_schema_corrupted() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        manager.initialize().unwrap();
        conn.execute("DROP TABLE note_tags", []).unwrap();

        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::Corrupted {
                missing_table: "note_tags".to_string()
            }
        );
    }

    #[test]
    fn test_meta_operations() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        manager.initialize().unwrap();

        manager.set_meta("test_key", "test_value").unwrap();
        assert_eq!(
            manager.get_meta("test_key").unwrap(),
            Some("test_value".to_string())
        );
        assert_eq!(manager.get_meta("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_schema_reset() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        manager.initialize().unwrap();
        conn.execute("INSERT INTO notes (id, body) VALUES (1, 'a')", [])
            .unwrap();
        conn.execute("INSERT INTO note_tags (note_id, tag) VALUES (1, 't')", [])
            .unwrap();

        manager.reset().unwrap();
        assert_eq!(
            manager.check_status().unwrap(),
            SchemaStatus::NotInitialized
        );
        assert!(!table_exists(&conn, "notes").unwrap());
    }

    #[test]
    fn test_script_contains_all_statements() {
        let conn = create_test_db();
        let manager = SchemaManager::new(&conn, modules());
        let script = manager.script();

        assert!(script.contains("CREATE TABLE IF NOT EXISTS __schema_meta"));
        assert!(script.contains("CREATE TABLE IF NOT EXISTS notes"));
        assert!(script.contains("idx_note_tags_tag"));
        assert!(script.contains("'schema_version:notes', '2'"));

        // The script must be executable as-is
        conn.execute_batch(&script).unwrap();
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
    }
}

//! Persistence context
//!
//! `AppDbContext` is the single point of access to the store. It is built
//! from [`ContextOptions`] without touching the database; the connection is
//! opened and the schema ensured on first use.
//!
//! ```text
//! AppDbContext
//! ├── customers()      # tracked set, written on save_changes()
//! └── identity stores  # users(), roles(), user_roles(), user_claims(),
//!                      # role_claims(), user_logins(), user_tokens()
//! ```
//!
//! A context serves one unit of work at a time. It can be moved between
//! threads but not shared.

mod customer;
mod factory;
mod options;

pub use customer::{ApplicationSchema, Customer, CustomerFields, CustomerId, CustomerSet, SaveSummary};
pub use factory::{AppDbContextFactory, DesignTimeContextFactory};
pub use options::{ContextOptions, ContextOptionsBuilder, DatabaseProvider};

use crate::database::core::{
    DatabaseConn, OpenMode, SchemaManager, SchemaModule, SchemaStatus, SqliteConnectionString,
};
use crate::database::identity::{
    IdentitySchema, RoleClaimStore, RoleStore, UserClaimStore, UserLoginStore, UserRoleStore,
    UserStore, UserTokenStore,
};
use crate::error::{CrmError, Result};
use chrono::{DateTime, Utc};
use customer::PendingChange;
use std::cell::{Cell, OnceCell, RefCell};
use tracing::{debug, info};

/// All schema modules of the context, in creation order
pub fn schema_modules() -> Vec<&'static dyn SchemaModule> {
    vec![&IdentitySchema as &dyn SchemaModule, &ApplicationSchema]
}

pub struct AppDbContext {
    options: ContextOptions,
    db: OnceCell<DatabaseConn>,
    schema_ready: Cell<bool>,
    pending: RefCell<Vec<PendingChange>>,
}

impl AppDbContext {
    /// Create a context; no connection is opened here
    pub fn new(options: ContextOptions) -> Self {
        Self {
            options,
            db: OnceCell::new(),
            schema_ready: Cell::new(false),
            pending: RefCell::new(Vec::new()),
        }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// The open connection, opening it if needed
    ///
    /// This does not check the schema.
    pub fn connection(&self) -> Result<&DatabaseConn> {
        if let Some(db) = self.db.get() {
            return Ok(db);
        }
        let cs = SqliteConnectionString::parse(self.options.connection_string())?;
        let db = DatabaseConn::open(&cs)?;
        Ok(self.db.get_or_init(|| db))
    }

    /// Schema manager over this context's modules
    pub fn schema(&self) -> Result<SchemaManager<'_>> {
        Ok(SchemaManager::new(&self.connection()?.conn, schema_modules()))
    }

    /// Create the schema if the database is empty
    ///
    /// Returns `true` when tables were created. A schema from another
    /// version, or with missing tables, is an error: data is never dropped
    /// implicitly.
    pub fn ensure_created(&self) -> Result<bool> {
        let schema = self.schema()?;
        let created = match schema.check_status()? {
            SchemaStatus::Current => false,
            SchemaStatus::NotInitialized => {
                if self.is_read_only()? {
                    return Err(CrmError::Schema(
                        "database is not initialized and was opened read-only".to_string(),
                    ));
                }
                info!("initializing database schema");
                schema.initialize()?;
                true
            }
            SchemaStatus::NeedsMigration { module, from, to } => {
                return Err(CrmError::Schema(format!(
                    "module '{}' needs migration from v{} to v{}",
                    module, from, to
                )));
            }
            SchemaStatus::Incompatible {
                module,
                database_version,
                required_version,
            } => {
                return Err(CrmError::Schema(format!(
                    "module '{}' is v{} in the database but v{} is required",
                    module, database_version, required_version
                )));
            }
            SchemaStatus::Corrupted { missing_table } => {
                return Err(CrmError::Schema(format!(
                    "table '{}' is missing",
                    missing_table
                )));
            }
        };
        self.schema_ready.set(true);
        Ok(created)
    }

    /// Connection with the schema ensured
    pub(crate) fn ready(&self) -> Result<&DatabaseConn> {
        if !self.schema_ready.get() {
            self.ensure_created()?;
        }
        self.connection()
    }

    fn is_read_only(&self) -> Result<bool> {
        let cs = SqliteConnectionString::parse(self.options.connection_string())?;
        Ok(cs.mode == OpenMode::ReadOnly)
    }

    // ---------------------------------------------------------------------
    // entity sets
    // ---------------------------------------------------------------------

    pub fn customers(&self) -> CustomerSet<'_> {
        CustomerSet::new(self)
    }

    pub fn users(&self) -> Result<UserStore<'_>> {
        Ok(UserStore::new(&self.ready()?.conn))
    }

    pub fn roles(&self) -> Result<RoleStore<'_>> {
        Ok(RoleStore::new(&self.ready()?.conn))
    }

    pub fn user_roles(&self) -> Result<UserRoleStore<'_>> {
        Ok(UserRoleStore::new(&self.ready()?.conn))
    }

    pub fn user_claims(&self) -> Result<UserClaimStore<'_>> {
        Ok(UserClaimStore::new(&self.ready()?.conn))
    }

    pub fn role_claims(&self) -> Result<RoleClaimStore<'_>> {
        Ok(RoleClaimStore::new(&self.ready()?.conn))
    }

    pub fn user_logins(&self) -> Result<UserLoginStore<'_>> {
        Ok(UserLoginStore::new(&self.ready()?.conn))
    }

    pub fn user_tokens(&self) -> Result<UserTokenStore<'_>> {
        Ok(UserTokenStore::new(&self.ready()?.conn))
    }

    // ---------------------------------------------------------------------
    // unit of work
    // ---------------------------------------------------------------------

    pub(crate) fn stage(&self, change: PendingChange) {
        self.pending.borrow_mut().push(change);
    }

    /// Number of staged changes not yet saved
    pub fn pending_changes(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drop all staged changes
    pub fn discard_changes(&self) {
        self.pending.borrow_mut().clear();
    }

    /// Write all staged changes in one transaction
    ///
    /// On error nothing is written and the staged changes are kept.
    pub fn save_changes(&self) -> Result<SaveSummary> {
        let db = self.ready()?;
        let pending = self.pending.borrow().clone();
        if pending.is_empty() {
            return Ok(SaveSummary::default());
        }

        let tx = db.transaction()?;
        let summary = customer::apply_changes(&tx, &pending, now_seconds())?;
        tx.commit()?;

        self.pending.borrow_mut().drain(..pending.len());
        debug!("saved {} change(s)", summary.affected());
        Ok(summary)
    }
}

/// Current time at the store's second precision
fn now_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_context(dir: &TempDir, extra: &str) -> AppDbContext {
        let cs = format!("Data Source={}{}", dir.path().join("crm.db").display(), extra);
        AppDbContext::new(ContextOptions::sqlite(cs).unwrap())
    }

    #[test]
    fn test_new_does_not_open_database() {
        let dir = TempDir::new().unwrap();
        let ctx = file_context(&dir, "");

        assert!(!dir.path().join("crm.db").exists());
        drop(ctx);
        assert!(!dir.path().join("crm.db").exists());
    }

    #[test]
    fn test_bad_connection_string_fails_on_first_use() {
        let ctx = AppDbContext::new(ContextOptions::sqlite("Server=x;Database").unwrap());
        assert!(matches!(
            ctx.customers().count().unwrap_err(),
            CrmError::InvalidConnectionString(_)
        ));
    }

    #[test]
    fn test_ensure_created() {
        let dir = TempDir::new().unwrap();
        let ctx = file_context(&dir, "");

        assert!(ctx.ensure_created().unwrap());
        assert!(!ctx.ensure_created().unwrap());
        assert_eq!(ctx.schema().unwrap().check_status().unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let ctx = file_context(&dir, "");
            let mut fields = CustomerFields::new();
            fields.insert("name".to_string(), "Ada".into());
            ctx.customers().add(fields);
            ctx.save_changes().unwrap();
        }

        let ctx = file_context(&dir, ";Mode=ReadWrite");
        assert_eq!(ctx.customers().count().unwrap(), 1);
    }

    #[test]
    fn test_read_only_uninitialized_database_fails() {
        let dir = TempDir::new().unwrap();
        // a zero-length file is an empty database
        std::fs::File::create(dir.path().join("crm.db")).unwrap();

        let ctx = file_context(&dir, ";Mode=ReadOnly");
        assert!(matches!(
            ctx.ensure_created().unwrap_err(),
            CrmError::Schema(_)
        ));
    }

    #[test]
    fn test_incompatible_schema_is_not_dropped() {
        let dir = TempDir::new().unwrap();
        let ctx = file_context(&dir, "");
        ctx.ensure_created().unwrap();
        ctx.schema()
            .unwrap()
            .set_meta("schema_version:application", "99")
            .unwrap();

        let reopened = file_context(&dir, "");
        assert!(matches!(
            reopened.customers().count().unwrap_err(),
            CrmError::Schema(_)
        ));
        assert!(reopened.connection().unwrap().table_exists("customers").unwrap());
    }

    #[test]
    fn test_save_without_changes() {
        let ctx = AppDbContext::new(ContextOptions::sqlite("Data Source=:memory:").unwrap());
        assert_eq!(ctx.save_changes().unwrap(), SaveSummary::default());
    }
}

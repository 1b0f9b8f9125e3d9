//! Error types for the data-access layer
//!
//! Every fallible operation in the library returns [`CrmError`]. Nothing is
//! caught or retried inside the crate; callers decide what to do.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    // ---------------------------------------------------------------------
    // configuration
    // ---------------------------------------------------------------------
    #[error("configuration file not found: {}", .0.display())]
    MissingConfigFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("connection string '{name}' not found in section 'ConnectionStrings'")]
    MissingConnectionString { name: String },

    #[error("connection string '{name}' is empty")]
    EmptyConnectionString { name: String },

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    // ---------------------------------------------------------------------
    // store
    // ---------------------------------------------------------------------
    #[error("failed to connect to '{target}': {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("concurrency conflict on {entity} '{id}': record was modified or deleted")]
    ConcurrencyConflict { entity: &'static str, id: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(rusqlite::Error),
}

impl CrmError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CrmError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: impl ToString) -> Self {
        CrmError::ConcurrencyConflict {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error came from the store rejecting a write
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, CrmError::Constraint(_))
    }
}

impl From<rusqlite::Error> for CrmError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => CrmError::Constraint(e.to_string()),
            _ => CrmError::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_constraint_errors_are_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();

        let err: CrmError = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_other_store_errors_pass_through() {
        let conn = Connection::open_in_memory().unwrap();
        let err: CrmError = conn
            .execute("SELECT * FROM missing_table", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, CrmError::Store(_)));
    }
}

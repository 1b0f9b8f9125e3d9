//! Context construction options

use crate::error::{CrmError, Result};
use std::fmt;

/// Database driver backing a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseProvider {
    Sqlite,
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseProvider::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Options a context is constructed with
///
/// The connection string is kept verbatim; it is parsed by the driver when
/// the context first touches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    provider: DatabaseProvider,
    connection_string: String,
}

impl ContextOptions {
    pub fn builder() -> ContextOptionsBuilder {
        ContextOptionsBuilder::default()
    }

    /// Shorthand for `builder().use_sqlite(..).build()`
    pub fn sqlite(connection_string: impl Into<String>) -> Result<Self> {
        Self::builder().use_sqlite(connection_string).build()
    }

    pub fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

#[derive(Debug, Default)]
pub struct ContextOptionsBuilder {
    provider: Option<(DatabaseProvider, String)>,
}

impl ContextOptionsBuilder {
    /// Use the SQLite driver with the given connection string
    pub fn use_sqlite(mut self, connection_string: impl Into<String>) -> Self {
        self.provider = Some((DatabaseProvider::Sqlite, connection_string.into()));
        self
    }

    pub fn build(self) -> Result<ContextOptions> {
        let (provider, connection_string) = self.provider.ok_or_else(|| {
            CrmError::InvalidConnectionString("no database provider configured".to_string())
        })?;

        if connection_string.trim().is_empty() {
            return Err(CrmError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        Ok(ContextOptions {
            provider,
            connection_string,
        })
    }
}

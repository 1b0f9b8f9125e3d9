//! Core database infrastructure
//!
//! This module provides the foundational database components used by the persistence context:
//! - `SqliteConnectionString`: parsed driver settings
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `SchemaManager`: Schema initialization and management over `SchemaModule`s
//! - `SchemaStatus`: Schema state enumeration

mod connection;
mod connection_string;
mod schema;

pub use connection::DatabaseConn;
pub use connection_string::{OpenMode, SqliteConnectionString, IN_MEMORY_SOURCE};
pub use schema::{SchemaManager, SchemaModule, SchemaStatus, META_TABLE_NAME};

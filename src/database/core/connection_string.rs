//! SQLite connection string parsing
//!
//! Connection strings are `;`-separated `key=value` pairs with
//! case-insensitive keys, e.g. `Data Source=crm.db;Mode=ReadWrite`.

use crate::error::{CrmError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Special data source naming a private in-memory database
pub const IN_MEMORY_SOURCE: &str = ":memory:";

/// How the database file is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    #[default]
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
    Memory,
}

impl FromStr for OpenMode {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "readwritecreate" => Ok(OpenMode::ReadWriteCreate),
            "readwrite" => Ok(OpenMode::ReadWrite),
            "readonly" => Ok(OpenMode::ReadOnly),
            "memory" => Ok(OpenMode::Memory),
            other => Err(CrmError::InvalidConnectionString(format!(
                "unknown Mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::ReadWriteCreate => write!(f, "ReadWriteCreate"),
            OpenMode::ReadWrite => write!(f, "ReadWrite"),
            OpenMode::ReadOnly => write!(f, "ReadOnly"),
            OpenMode::Memory => write!(f, "Memory"),
        }
    }
}

/// Parsed SQLite connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConnectionString {
    /// File path or `:memory:`; `None` when the string names no source
    pub data_source: Option<String>,
    pub mode: OpenMode,
    pub foreign_keys: bool,
    pub default_timeout: Option<Duration>,
    /// Keys this driver does not understand, in input order
    pub unrecognized: Vec<(String, String)>,
}

impl Default for SqliteConnectionString {
    fn default() -> Self {
        Self {
            data_source: None,
            mode: OpenMode::default(),
            foreign_keys: true,
            default_timeout: None,
            unrecognized: Vec::new(),
        }
    }
}

impl SqliteConnectionString {
    /// Parse a connection string
    ///
    /// Empty segments are skipped. A segment without `=` is an error.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parsed = SqliteConnectionString::default();

        for segment in s.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (key, value) = segment.split_once('=').ok_or_else(|| {
                CrmError::InvalidConnectionString(format!(
                    "expected 'key=value', found '{}'",
                    segment
                ))
            })?;
            let key = key.trim();
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');

            match normalize_key(key).as_str() {
                "datasource" | "filename" | "database" => {
                    parsed.data_source = Some(value.to_string());
                }
                "mode" => parsed.mode = value.parse()?,
                "foreignkeys" => parsed.foreign_keys = parse_bool(key, value)?,
                "defaulttimeout" => {
                    let secs: u64 = value.parse().map_err(|_| {
                        CrmError::InvalidConnectionString(format!(
                            "'{}' must be a number of seconds, found '{}'",
                            key, value
                        ))
                    })?;
                    parsed.default_timeout = Some(Duration::from_secs(secs));
                }
                _ => parsed
                    .unrecognized
                    .push((key.to_string(), value.to_string())),
            }
        }

        Ok(parsed)
    }

    /// Whether this string resolves to a private in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.mode == OpenMode::Memory
            || self
                .data_source
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(IN_MEMORY_SOURCE))
    }
}

/// `Data Source`, `data_source` and `DataSource` all map to `datasource`
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(CrmError::InvalidConnectionString(format!(
            "'{}' must be a boolean, found '{}'",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_source() {
        let cs = SqliteConnectionString::parse("Data Source=crm.db").unwrap();
        assert_eq!(cs.data_source.as_deref(), Some("crm.db"));
        assert_eq!(cs.mode, OpenMode::ReadWriteCreate);
        assert!(cs.foreign_keys);
        assert!(!cs.is_in_memory());
    }

    #[test]
    fn test_parse_aliases_and_case() {
        for s in ["filename=a.db", "DATASOURCE=a.db", "Database=a.db", "data_source=a.db"] {
            let cs = SqliteConnectionString::parse(s).unwrap();
            assert_eq!(cs.data_source.as_deref(), Some("a.db"), "{}", s);
        }
    }

    #[test]
    fn test_parse_full() {
        let cs = SqliteConnectionString::parse(
            "Data Source=\"/tmp/crm.db\"; Mode=ReadOnly; Foreign Keys=False; Default Timeout=5;",
        )
        .unwrap();
        assert_eq!(cs.data_source.as_deref(), Some("/tmp/crm.db"));
        assert_eq!(cs.mode, OpenMode::ReadOnly);
        assert!(!cs.foreign_keys);
        assert_eq!(cs.default_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_unrecognized_keys_are_kept() {
        let cs = SqliteConnectionString::parse("Server=x;Database=y;Trusted_Connection=True")
            .unwrap();
        assert_eq!(cs.data_source.as_deref(), Some("y"));
        assert_eq!(
            cs.unrecognized,
            vec![
                ("Server".to_string(), "x".to_string()),
                ("Trusted_Connection".to_string(), "True".to_string()),
            ]
        );
    }

    #[test]
    fn test_in_memory() {
        assert!(SqliteConnectionString::parse("Data Source=:memory:")
            .unwrap()
            .is_in_memory());
        assert!(SqliteConnectionString::parse("Mode=Memory")
            .unwrap()
            .is_in_memory());
    }

    #[test]
    fn test_invalid_segments() {
        assert!(SqliteConnectionString::parse("Data Source").is_err());
        assert!(SqliteConnectionString::parse("Mode=Sideways").is_err());
        assert!(SqliteConnectionString::parse("Foreign Keys=maybe").is_err());
        assert!(SqliteConnectionString::parse("Default Timeout=soon").is_err());
    }
}

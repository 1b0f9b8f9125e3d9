//! Application settings
//!
//! Settings are read from `appsettings.json` (and an optional
//! `appsettings.{Environment}.json` overlay) using the `config` crate.
//! Loading is explicit: every call reads the files again and nothing is
//! cached process-wide.

use crate::error::{CrmError, Result};
use config::{Config, File, FileFormat, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional settings file name, resolved against the base path
pub const SETTINGS_FILE_NAME: &str = "appsettings.json";

/// Section holding named connection strings
pub const CONNECTION_STRINGS_SECTION: &str = "ConnectionStrings";

/// Name of the connection string used by the design-time factory
pub const DEFAULT_CONNECTION_NAME: &str = "DefaultConnection";

/// Template written by `crm-data init`
pub const EMPTY_SETTINGS: &str = r#"{
  "ConnectionStrings": {
    "DefaultConnection": "Data Source=crm.db"
  }
}
"#;

/// Settings loaded from one or more JSON sources
#[derive(Debug, Clone)]
pub struct AppSettings {
    values: Map<String, Value>,
    sources: Vec<PathBuf>,
}

impl AppSettings {
    /// Load `appsettings.json` from `base_path`
    ///
    /// Fails if the file is absent or malformed.
    pub fn load(base_path: &Path) -> Result<Self> {
        Self::load_with_environment(base_path, None)
    }

    /// Load `appsettings.json` plus `appsettings.{environment}.json`
    ///
    /// The base file is required. The environment overlay is optional and
    /// its values take precedence.
    pub fn load_with_environment(base_path: &Path, environment: Option<&str>) -> Result<Self> {
        let base_file = base_path.join(SETTINGS_FILE_NAME);
        if !base_file.is_file() {
            return Err(CrmError::MissingConfigFile(base_file));
        }

        let mut sources = vec![base_file.clone()];
        let mut builder =
            Config::builder().add_source(File::from(base_file).format(FileFormat::Json));

        if let Some(env) = environment.filter(|e| !e.trim().is_empty()) {
            let overlay = base_path.join(format!("appsettings.{}.json", env.trim()));
            debug!("adding optional settings overlay {}", overlay.display());
            if overlay.is_file() {
                sources.push(overlay.clone());
            }
            builder = builder.add_source(
                File::from(overlay)
                    .format(FileFormat::Json)
                    .required(false),
            );
        }

        let values = builder.build()?.try_deserialize::<Map<String, Value>>()?;
        Ok(AppSettings { values, sources })
    }

    /// Parse settings from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let values = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Json))
            .build()?
            .try_deserialize::<Map<String, Value>>()?;
        Ok(AppSettings {
            values,
            sources: Vec::new(),
        })
    }

    /// Files that contributed to these settings, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Look up a named connection string
    ///
    /// Section and key names match case-insensitively. A missing or blank
    /// value is an error.
    pub fn connection_string(&self, name: &str) -> Result<String> {
        let missing = || CrmError::MissingConnectionString {
            name: name.to_string(),
        };

        let section = lookup(&self.values, CONNECTION_STRINGS_SECTION)
            .ok_or_else(missing)?
            .clone()
            .into_table()
            .map_err(|_| missing())?;

        let value = lookup(&section, name)
            .ok_or_else(missing)?
            .clone()
            .into_string()
            .map_err(|_| missing())?;

        if value.trim().is_empty() {
            return Err(CrmError::EmptyConnectionString {
                name: name.to_string(),
            });
        }
        Ok(value)
    }

    /// The `DefaultConnection` connection string
    pub fn default_connection(&self) -> Result<String> {
        self.connection_string(DEFAULT_CONNECTION_NAME)
    }
}

/// Exact match first, then the first case-insensitive one
fn lookup<'a>(table: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    table.get(key).or_else(|| {
        table
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Extract a named connection string from settings file contents
pub fn connection_string_from_json(contents: &str, name: &str) -> Result<String> {
    AppSettings::from_json_str(contents)?.connection_string(name)
}

/// Write the settings template to `path` unless a file already exists
///
/// Returns `true` when the template was written.
pub fn write_settings_template(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, EMPTY_SETTINGS).map_err(|e| {
        CrmError::Configuration(config::ConfigError::Message(format!(
            "unable to create settings file {}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_settings(dir: &TempDir, name: &str, contents: &str) {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_connection_string_from_json() {
        let json = r#"{"ConnectionStrings": {"DefaultConnection": "Server=x;Database=y;Trusted_Connection=True"}}"#;
        let cs = connection_string_from_json(json, DEFAULT_CONNECTION_NAME).unwrap();
        assert_eq!(cs, "Server=x;Database=y;Trusted_Connection=True");
    }

    #[test]
    fn test_missing_key_fails() {
        let json = r#"{"ConnectionStrings": {"Other": "Data Source=a.db"}}"#;
        let err = connection_string_from_json(json, DEFAULT_CONNECTION_NAME).unwrap_err();
        assert!(matches!(err, CrmError::MissingConnectionString { .. }));
    }

    #[test]
    fn test_missing_section_fails() {
        let err = connection_string_from_json(r#"{"Logging": {}}"#, DEFAULT_CONNECTION_NAME)
            .unwrap_err();
        assert!(matches!(err, CrmError::MissingConnectionString { .. }));
    }

    #[test]
    fn test_blank_value_fails() {
        let json = r#"{"ConnectionStrings": {"DefaultConnection": "   "}}"#;
        let err = connection_string_from_json(json, DEFAULT_CONNECTION_NAME).unwrap_err();
        assert!(matches!(err, CrmError::EmptyConnectionString { .. }));
    }

    #[test]
    fn test_malformed_json_fails() {
        let err = connection_string_from_json("{ not json", DEFAULT_CONNECTION_NAME).unwrap_err();
        assert!(matches!(err, CrmError::Configuration(_)));
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let json = r#"{"connectionStrings": {"defaultconnection": "Data Source=a.db"}}"#;
        let cs = connection_string_from_json(json, DEFAULT_CONNECTION_NAME).unwrap();
        assert_eq!(cs, "Data Source=a.db");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = AppSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, CrmError::MissingConfigFile(_)));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        write_settings(&dir, SETTINGS_FILE_NAME, EMPTY_SETTINGS);

        let settings = AppSettings::load(dir.path()).unwrap();
        assert_eq!(settings.default_connection().unwrap(), "Data Source=crm.db");
        assert_eq!(settings.sources().len(), 1);
    }

    #[test]
    fn test_environment_overlay_wins() {
        let dir = TempDir::new().unwrap();
        write_settings(&dir, SETTINGS_FILE_NAME, EMPTY_SETTINGS);
        write_settings(
            &dir,
            "appsettings.Development.json",
            r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=dev.db"}}"#,
        );

        let settings =
            AppSettings::load_with_environment(dir.path(), Some("Development")).unwrap();
        assert_eq!(settings.default_connection().unwrap(), "Data Source=dev.db");
        assert_eq!(settings.sources().len(), 2);
    }

    #[test]
    fn test_missing_overlay_is_ignored() {
        let dir = TempDir::new().unwrap();
        write_settings(&dir, SETTINGS_FILE_NAME, EMPTY_SETTINGS);

        let settings = AppSettings::load_with_environment(dir.path(), Some("Production")).unwrap();
        assert_eq!(settings.default_connection().unwrap(), "Data Source=crm.db");
    }

    #[test]
    fn test_write_template_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        assert!(write_settings_template(&path).unwrap());
        assert!(!write_settings_template(&path).unwrap());
        assert!(AppSettings::load(dir.path()).is_ok());
    }
}

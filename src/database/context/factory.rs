//! Design-time context factory
//!
//! External tooling (schema scripts, inspection commands) needs a configured
//! context without running the application. The factory builds one from
//! `appsettings.json` in a base directory, by default the current working
//! directory.

use crate::config::{AppSettings, DEFAULT_CONNECTION_NAME};
use crate::database::context::{AppDbContext, ContextOptions};
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Produces a configured context for design-time tooling
pub trait DesignTimeContextFactory {
    type Context;

    /// `args` are whatever the tool was invoked with
    fn create_context(&self, args: &[String]) -> Result<Self::Context>;
}

/// Builds an [`AppDbContext`] from the `DefaultConnection` connection string
#[derive(Debug, Clone, Default)]
pub struct AppDbContextFactory {
    base_path: Option<PathBuf>,
    environment: Option<String>,
}

impl AppDbContextFactory {
    /// Factory reading settings from the current working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from `path` instead of the working directory
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Also read `appsettings.{environment}.json` if present
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Directory settings are read from; resolved on every call
    pub fn base_path(&self) -> Result<PathBuf> {
        match &self.base_path {
            Some(p) => Ok(p.clone()),
            None => Ok(std::env::current_dir().map_err(|e| {
                config::ConfigError::Message(format!(
                    "unable to resolve current directory: {}",
                    e
                ))
            })?),
        }
    }

    /// Load settings and build context options, without creating a context
    pub fn options(&self) -> Result<ContextOptions> {
        let base_path = self.base_path()?;
        let settings =
            AppSettings::load_with_environment(&base_path, self.environment.as_deref())?;
        let connection_string = settings.connection_string(DEFAULT_CONNECTION_NAME)?;
        debug!(
            "resolved '{}' from {} settings file(s) in {}",
            DEFAULT_CONNECTION_NAME,
            settings.sources().len(),
            base_path.display()
        );

        ContextOptions::builder()
            .use_sqlite(connection_string)
            .build()
    }
}

impl DesignTimeContextFactory for AppDbContextFactory {
    type Context = AppDbContext;

    fn create_context(&self, args: &[String]) -> Result<AppDbContext> {
        if !args.is_empty() {
            debug!("ignoring {} design-time argument(s)", args.len());
        }
        Ok(AppDbContext::new(self.options()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SETTINGS_FILE_NAME;
    use crate::error::CrmError;
    use tempfile::TempDir;

    fn settings_dir(contents: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE_NAME), contents).unwrap();
        dir
    }

    #[test]
    fn test_context_carries_exact_connection_string() {
        let cs = "Server=x;Database=y;User Id=sa;Password=p@ss;";
        let dir = settings_dir(&format!(
            r#"{{"ConnectionStrings": {{"DefaultConnection": "{}"}}}}"#,
            cs
        ));

        let ctx = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .create_context(&[])
            .unwrap();
        assert_eq!(ctx.options().connection_string(), cs);
    }

    #[test]
    fn test_missing_key_fails() {
        let dir = settings_dir(r#"{"ConnectionStrings": {}}"#);
        let err = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .create_context(&[])
            .err()
            .unwrap();
        assert!(matches!(err, CrmError::MissingConnectionString { .. }));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .create_context(&[])
            .err()
            .unwrap();
        assert!(matches!(err, CrmError::MissingConfigFile(_)));
    }

    #[test]
    fn test_malformed_file_fails() {
        let dir = settings_dir("{ \"ConnectionStrings\": ");
        let err = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .create_context(&[])
            .err()
            .unwrap();
        assert!(matches!(err, CrmError::Configuration(_)));
    }

    #[test]
    fn test_args_are_ignored() {
        let dir = settings_dir(r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=a.db"}}"#);
        let factory = AppDbContextFactory::new().with_base_path(dir.path());

        let a = factory.create_context(&[]).unwrap();
        let b = factory
            .create_context(&["--verbose".to_string(), "x".to_string()])
            .unwrap();
        assert_eq!(a.options(), b.options());
    }

    #[test]
    fn test_factory_does_not_open_database() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("crm.db");
        std::fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            format!(
                r#"{{"ConnectionStrings": {{"DefaultConnection": "Data Source={}"}}}}"#,
                db_path.display()
            ),
        )
        .unwrap();

        let ctx = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .create_context(&[])
            .unwrap();
        assert!(!db_path.exists());

        ctx.ensure_created().unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_settings_are_read_fresh() {
        let dir = settings_dir(r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=a.db"}}"#);
        let factory = AppDbContextFactory::new().with_base_path(dir.path());
        assert_eq!(
            factory.options().unwrap().connection_string(),
            "Data Source=a.db"
        );

        std::fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=b.db"}}"#,
        )
        .unwrap();
        assert_eq!(
            factory.options().unwrap().connection_string(),
            "Data Source=b.db"
        );
    }

    #[test]
    fn test_environment_overlay() {
        let dir = settings_dir(r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=a.db"}}"#);
        std::fs::write(
            dir.path().join("appsettings.Staging.json"),
            r#"{"ConnectionStrings": {"DefaultConnection": "Data Source=staging.db"}}"#,
        )
        .unwrap();

        let options = AppDbContextFactory::new()
            .with_base_path(dir.path())
            .with_environment("Staging")
            .options()
            .unwrap();
        assert_eq!(options.connection_string(), "Data Source=staging.db");
    }
}

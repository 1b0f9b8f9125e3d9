use super::{print_value, OutputFormat};
use clap::Args;
use crm_data::config::AppSettings;
use crm_data::database::SqliteConnectionString;
use crm_data::{AppDbContextFactory, DEFAULT_CONNECTION_NAME};
use serde::Serialize;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also list the settings files that were read
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    base_path: String,
    environment: Option<String>,
    connection_name: &'static str,
    connection_string: String,
    provider: String,
    data_source: Option<String>,
    mode: String,
    foreign_keys: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<String>>,
}

pub fn run(
    factory: &AppDbContextFactory,
    environment: Option<&str>,
    args: ConfigArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let base_path = factory.base_path()?;
    let settings = AppSettings::load_with_environment(&base_path, environment)?;
    let options = factory.options()?;
    let parsed = SqliteConnectionString::parse(options.connection_string())?;

    let info = ConfigInfo {
        base_path: base_path.display().to_string(),
        environment: environment.map(str::to_string),
        connection_name: DEFAULT_CONNECTION_NAME,
        connection_string: options.connection_string().to_string(),
        provider: options.provider().to_string(),
        data_source: parsed.data_source.clone(),
        mode: parsed.mode.to_string(),
        foreign_keys: parsed.foreign_keys,
        sources: args.verbose.then(|| {
            settings
                .sources()
                .iter()
                .map(|p| p.display().to_string())
                .collect()
        }),
    };

    let mut pairs = vec![
        ("base path", info.base_path.clone()),
        (
            "environment",
            info.environment.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("connection", info.connection_name.to_string()),
        ("connection string", info.connection_string.clone()),
        ("provider", info.provider.clone()),
        (
            "data source",
            info.data_source.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("mode", info.mode.clone()),
        ("foreign keys", info.foreign_keys.to_string()),
    ];
    if let Some(sources) = &info.sources {
        for source in sources {
            pairs.push(("settings file", source.clone()));
        }
    }

    print_value(&info, pairs, output_format)
}

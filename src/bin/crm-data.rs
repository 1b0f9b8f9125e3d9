#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crm_data::{AppDbContextFactory, DesignTimeContextFactory};
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::customers::CustomersArgs;
use commands::init::InitArgs;
use commands::schema::SchemaArgs;
use commands::OutputFormat;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Directory containing appsettings.json, by default the current directory
    #[clap(short, long, global = true)]
    base_path: Option<PathBuf>,

    /// Environment name; appsettings.{ENV}.json is layered on top when present
    #[clap(short, long, global = true, env = "CRM_ENVIRONMENT")]
    environment: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line
    #[clap(short, long, global = true, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Extra arguments handed to the context factory (currently unused by it)
    #[clap(long = "factory-arg", global = true, value_name = "ARG")]
    factory_args: Vec<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a settings template and create the database schema
    Init(InitArgs),

    /// Show the resolved settings and connection string
    Config(ConfigArgs),

    /// Inspect, apply, reset or print the database schema
    Schema(SchemaArgs),

    /// Manage customers
    Customers(CustomersArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(debug_level())
            .init();
    }

    let mut factory = AppDbContextFactory::new();
    if let Some(path) = &cli.base_path {
        factory = factory.with_base_path(path);
    }
    if let Some(env) = &cli.environment {
        factory = factory.with_environment(env);
    }

    if let Err(e) = run(cli, &factory) {
        eprintln!("ERROR: {e:#}");
        std::process::exit(1);
    }
}

/// Level installed by `--debug`; the library logs connection and factory
/// detail at DEBUG
fn debug_level() -> Level {
    Level::DEBUG
}

fn run(cli: Cli, factory: &AppDbContextFactory) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init(args) => commands::init::run(factory, &cli.factory_args, args),
        Commands::Config(args) => {
            commands::config::run(factory, cli.environment.as_deref(), args, cli.format)
        }
        Commands::Schema(args) => {
            let ctx = factory.create_context(&cli.factory_args)?;
            commands::schema::run(&ctx, args, cli.format)
        }
        Commands::Customers(args) => {
            let ctx = factory.create_context(&cli.factory_args)?;
            commands::customers::run(&ctx, args, cli.format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_debug_flag_enables_debug_events() {
        let filter = LevelFilter::from_level(debug_level());
        assert!(filter >= LevelFilter::DEBUG);

        let cli = Cli::parse_from(["crm-data", "--debug", "schema", "status"]);
        assert!(cli.debug);
    }
}

use super::{print_value, OutputFormat};
use clap::{Args, Subcommand};
use crm_data::database::schema_modules;
use crm_data::{AppDbContext, SchemaStatus};
use serde::Serialize;

/// Arguments for the Schema command
#[derive(Args)]
pub struct SchemaArgs {
    #[clap(subcommand)]
    pub command: Option<SchemaCommands>,
}

/// Schema subcommands
#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Show schema status (default when no subcommand)
    Status,

    /// Create the schema if the database is empty
    Apply,

    /// Drop every table of the schema
    Reset {
        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Print the DDL script for the schema
    Script,
}

#[derive(Debug, Serialize)]
struct ModuleInfo {
    name: &'static str,
    required_version: u32,
    database_version: Option<u32>,
}

#[derive(Debug, Serialize)]
struct StatusInfo {
    status: String,
    modules: Vec<ModuleInfo>,
}

pub fn run(ctx: &AppDbContext, args: SchemaArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    match args.command {
        None | Some(SchemaCommands::Status) => run_status(ctx, output_format),
        Some(SchemaCommands::Apply) => {
            if ctx.ensure_created()? {
                println!("Schema created");
            } else {
                println!("Schema is up to date");
            }
            Ok(())
        }
        Some(SchemaCommands::Reset { yes }) => {
            if !yes {
                eprintln!("Resetting drops all customer and identity data.");
                eprintln!("Re-run with --yes to confirm.");
                return Ok(());
            }
            ctx.schema()?.reset()?;
            println!("Schema dropped");
            Ok(())
        }
        Some(SchemaCommands::Script) => {
            print!("{}", ctx.schema()?.script());
            Ok(())
        }
    }
}

fn run_status(ctx: &AppDbContext, output_format: OutputFormat) -> anyhow::Result<()> {
    let schema = ctx.schema()?;
    let status = describe(&schema.check_status()?);

    let mut modules = Vec::new();
    for module in schema_modules() {
        modules.push(ModuleInfo {
            name: module.name(),
            required_version: module.version(),
            database_version: schema.module_version(module.name())?,
        });
    }

    let mut pairs = vec![("status", status.clone())];
    for m in &modules {
        pairs.push((
            m.name,
            match m.database_version {
                Some(v) => format!("v{} (requires v{})", v, m.required_version),
                None => format!("- (requires v{})", m.required_version),
            },
        ));
    }

    print_value(&StatusInfo { status, modules }, pairs, output_format)
}

fn describe(status: &SchemaStatus) -> String {
    match status {
        SchemaStatus::NotInitialized => "not initialized".to_string(),
        SchemaStatus::Current => "current".to_string(),
        SchemaStatus::NeedsMigration { module, from, to } => {
            format!("{} needs migration v{} -> v{}", module, from, to)
        }
        SchemaStatus::Incompatible {
            module,
            database_version,
            required_version,
        } => format!(
            "{} is v{}, incompatible with v{}",
            module, database_version, required_version
        ),
        SchemaStatus::Corrupted { missing_table } => {
            format!("corrupted, missing table {}", missing_table)
        }
    }
}

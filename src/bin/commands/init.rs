use clap::Args;
use crm_data::config::write_settings_template;
use crm_data::{AppDbContextFactory, DesignTimeContextFactory, SETTINGS_FILE_NAME};
use tracing::info;

/// Arguments for the Init command
#[derive(Args)]
pub struct InitArgs {
    /// Only write the settings file, do not create the database schema
    #[clap(long)]
    pub settings_only: bool,
}

pub fn run(
    factory: &AppDbContextFactory,
    factory_args: &[String],
    args: InitArgs,
) -> anyhow::Result<()> {
    let path = factory.base_path()?.join(SETTINGS_FILE_NAME);
    if write_settings_template(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists, leaving it untouched", path.display());
    }

    if args.settings_only {
        return Ok(());
    }

    let ctx = factory.create_context(factory_args)?;
    if ctx.ensure_created()? {
        info!("schema created");
        println!("Database schema created");
    } else {
        println!("Database schema is up to date");
    }
    Ok(())
}

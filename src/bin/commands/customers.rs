use super::{print_rows, truncate, OutputFormat};
use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use crm_data::{AppDbContext, Customer, CustomerFields, CustomerId};
use serde_json::Value;
use tabled::Tabled;

/// Arguments for the Customers command
#[derive(Args)]
pub struct CustomersArgs {
    #[clap(subcommand)]
    pub command: CustomersCommands,
}

/// Customers subcommands
#[derive(Subcommand)]
pub enum CustomersCommands {
    /// List all customers
    List,

    /// Show one customer
    Get {
        #[clap(value_name = "ID")]
        id: i64,
    },

    /// Add a customer from a JSON object, e.g. '{"name": "Ada"}'
    Add {
        #[clap(value_name = "JSON")]
        fields: String,
    },

    /// Update a customer's fields from a JSON object
    Update {
        #[clap(value_name = "ID")]
        id: i64,

        #[clap(value_name = "JSON")]
        fields: String,

        /// Replace all fields instead of merging into the existing ones
        #[clap(long)]
        replace: bool,
    },

    /// Remove a customer
    Remove {
        #[clap(value_name = "ID")]
        id: i64,
    },

    /// Count customers
    Count,

    /// Find customers whose FIELD equals VALUE (VALUE is parsed as JSON, else used as a string)
    Find {
        #[clap(value_name = "FIELD")]
        field: String,

        #[clap(value_name = "VALUE")]
        value: String,
    },
}

#[derive(Tabled)]
struct CustomerRow {
    id: i64,
    fields: String,
    created_at: String,
    updated_at: String,
}

impl From<&Customer> for CustomerRow {
    fn from(c: &Customer) -> Self {
        CustomerRow {
            id: c.id.0,
            fields: truncate(&Value::Object(c.fields.clone()).to_string(), 60),
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.to_rfc3339(),
        }
    }
}

pub fn run(
    ctx: &AppDbContext,
    args: CustomersArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match args.command {
        CustomersCommands::List => show(&ctx.customers().list()?, output_format),
        CustomersCommands::Get { id } => match ctx.customers().find(CustomerId(id))? {
            Some(customer) => show(&[customer], output_format),
            None => bail!("customer {} not found", id),
        },
        CustomersCommands::Add { fields } => {
            ctx.customers().add(parse_fields(&fields)?);
            let summary = ctx.save_changes()?;
            show(&summary.inserted, output_format)
        }
        CustomersCommands::Update {
            id,
            fields,
            replace,
        } => {
            let mut customer = ctx
                .customers()
                .find(CustomerId(id))?
                .ok_or_else(|| anyhow!("customer {} not found", id))?;
            let fields = parse_fields(&fields)?;
            if replace {
                customer.fields = fields;
            } else {
                customer.fields.extend(fields);
            }
            ctx.customers().update(customer);
            ctx.save_changes()?;
            let updated = ctx.customers().find(CustomerId(id))?;
            show(updated.as_slice(), output_format)
        }
        CustomersCommands::Remove { id } => {
            ctx.customers().remove(CustomerId(id));
            ctx.save_changes()?;
            println!("Removed customer {}", id);
            Ok(())
        }
        CustomersCommands::Count => {
            println!("{}", ctx.customers().count()?);
            Ok(())
        }
        CustomersCommands::Find { field, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            show(&ctx.customers().find_by_field(&field, &value)?, output_format)
        }
    }
}

fn show(customers: &[Customer], output_format: OutputFormat) -> anyhow::Result<()> {
    let rows = customers.iter().map(CustomerRow::from).collect();
    print_rows::<CustomerRow, Customer>(rows, customers, output_format)
}

fn parse_fields(json: &str) -> anyhow::Result<CustomerFields> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(fields) => Ok(fields),
        other => bail!("customer fields must be a JSON object, got: {}", other),
    }
}

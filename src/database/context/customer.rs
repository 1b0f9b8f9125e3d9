//! Customer entity and its tracked collection
//!
//! The customer shape is owned by the application: attributes live in a
//! JSON document column and this crate never interprets field names beyond
//! lookups the caller asks for.

use crate::database::context::AppDbContext;
use crate::database::core::SchemaModule;
use crate::error::{CrmError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Application-defined customer attributes
pub type CustomerFields = Map<String, Value>;

/// Primary key assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub fields: CustomerFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Schema module for application entities
pub struct ApplicationSchema;

impl SchemaModule for ApplicationSchema {
    fn name(&self) -> &'static str {
        "application"
    }

    fn version(&self) -> u32 {
        1
    }

    fn tables(&self) -> &'static [(&'static str, &'static str)] {
        &[(
            "customers",
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data TEXT NOT NULL CHECK (json_valid(data)),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )]
    }
}

/// A change staged on the context, applied by `save_changes`
#[derive(Debug, Clone)]
pub(crate) enum PendingChange {
    Add(CustomerFields),
    Update(Customer),
    Remove(CustomerId),
}

/// Outcome of `AppDbContext::save_changes`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveSummary {
    /// Added customers with their store-assigned ids, in staging order
    pub inserted: Vec<Customer>,
    pub updated: usize,
    pub deleted: usize,
}

impl SaveSummary {
    /// Total number of rows written
    pub fn affected(&self) -> usize {
        self.inserted.len() + self.updated + self.deleted
    }
}

/// Customer collection of a context
///
/// Reads go straight to the store. Writes are staged and only reach the
/// store on `AppDbContext::save_changes`.
pub struct CustomerSet<'a> {
    ctx: &'a AppDbContext,
}

const CUSTOMER_COLUMNS: &str = "id, data, created_at, updated_at";

impl<'a> CustomerSet<'a> {
    pub(crate) fn new(ctx: &'a AppDbContext) -> Self {
        Self { ctx }
    }

    /// Stage a new customer
    pub fn add(&self, fields: CustomerFields) {
        self.ctx.stage(PendingChange::Add(fields));
    }

    /// Stage an update of an existing customer's fields
    pub fn update(&self, customer: Customer) {
        self.ctx.stage(PendingChange::Update(customer));
    }

    /// Stage removal of a customer
    pub fn remove(&self, id: CustomerId) {
        self.ctx.stage(PendingChange::Remove(id));
    }

    pub fn find(&self, id: CustomerId) -> Result<Option<Customer>> {
        find_customer(&self.ctx.ready()?.conn, id)
    }

    /// All customers ordered by id
    pub fn list(&self) -> Result<Vec<Customer>> {
        let conn = &self.ctx.ready()?.conn;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM customers ORDER BY id",
            CUSTOMER_COLUMNS
        ))?;
        let rows = stmt.query_map([], raw_customer)?;
        rows.map(|r| r?.into_customer()).collect()
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .ctx
            .ready()?
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Customers whose top-level `field` equals `value`
    ///
    /// `Null` matches both an explicit null and an absent field.
    pub fn find_by_field(&self, field: &str, value: &Value) -> Result<Vec<Customer>> {
        let conn = &self.ctx.ready()?.conn;
        let path = json_path(field);

        // json_extract maps true/false to 1/0, so the JSON type is checked too
        let (predicate, param): (&str, rusqlite::types::Value) = match value {
            Value::Null => ("json_extract(data, ?1) IS NULL", rusqlite::types::Value::Null),
            Value::Bool(b) => (
                "json_type(data, ?1) = ?2",
                if *b { "true" } else { "false" }.to_string().into(),
            ),
            Value::Number(n) => {
                let param = match n.as_i64() {
                    Some(i) => i.into(),
                    None => n.as_f64().unwrap_or_default().into(),
                };
                (
                    "json_type(data, ?1) IN ('integer', 'real') AND json_extract(data, ?1) = ?2",
                    param,
                )
            }
            Value::String(s) => (
                "json_type(data, ?1) = 'text' AND json_extract(data, ?1) = ?2",
                s.clone().into(),
            ),
            Value::Array(_) | Value::Object(_) => (
                "json_type(data, ?1) IN ('array', 'object') AND json_extract(data, ?1) = json(?2)",
                value.to_string().into(),
            ),
        };

        let sql = format!(
            "SELECT {} FROM customers WHERE {} ORDER BY id",
            CUSTOMER_COLUMNS, predicate
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = if matches!(value, Value::Null) {
            stmt.query_map([path], raw_customer)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(rusqlite::params![path, param], raw_customer)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        rows.into_iter().map(RawCustomer::into_customer).collect()
    }
}

/// Apply staged changes inside an open transaction
pub(crate) fn apply_changes(
    conn: &Connection,
    changes: &[PendingChange],
    now: DateTime<Utc>,
) -> Result<SaveSummary> {
    let mut summary = SaveSummary::default();
    let ts = now.timestamp();

    for change in changes {
        match change {
            PendingChange::Add(fields) => {
                let data = serde_json::to_string(fields)?;
                conn.execute(
                    "INSERT INTO customers (data, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    rusqlite::params![data, ts],
                )?;
                summary.inserted.push(Customer {
                    id: CustomerId(conn.last_insert_rowid()),
                    fields: fields.clone(),
                    created_at: now,
                    updated_at: now,
                });
            }
            PendingChange::Update(customer) => {
                let data = serde_json::to_string(&customer.fields)?;
                let n = conn.execute(
                    "UPDATE customers SET data = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![data, ts, customer.id.0],
                )?;
                if n == 0 {
                    return Err(CrmError::not_found("customer", customer.id));
                }
                summary.updated += n;
            }
            PendingChange::Remove(id) => {
                let n = conn.execute("DELETE FROM customers WHERE id = ?1", [id.0])?;
                if n == 0 {
                    return Err(CrmError::not_found("customer", id));
                }
                summary.deleted += n;
            }
        }
    }

    Ok(summary)
}

fn find_customer(conn: &Connection, id: CustomerId) -> Result<Option<Customer>> {
    conn.query_row(
        &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS),
        [id.0],
        raw_customer,
    )
    .optional()?
    .map(RawCustomer::into_customer)
    .transpose()
}

/// `$."field"`, so keys with dots or spaces address a single member
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

struct RawCustomer {
    id: i64,
    data: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawCustomer {
    fn into_customer(self) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId(self.id),
            fields: serde_json::from_str(&self.data)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn raw_customer(row: &Row<'_>) -> rusqlite::Result<RawCustomer> {
    Ok(RawCustomer {
        id: row.get(0)?,
        data: row.get(1)?,
        created_at: timestamp(row, 2)?,
        updated_at: timestamp(row, 3)?,
    })
}

/// Read a unix-seconds column as a UTC timestamp
fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

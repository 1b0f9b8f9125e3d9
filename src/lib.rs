#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! crm-data - data access for a customer-relationship-management application
//!
//! crm-data binds the application's `Customer` entity and the standard
//! identity/authentication schema to a SQLite store. The crate can be used
//! as a library or through the `crm-data` design-time tool.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Persistence context, identity stores, settings | `rusqlite`, `config` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Design-time tool binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: persistence context, schema modules and stores
//!   - `core`: SQLite connection management and schema composition
//!   - `context`: `AppDbContext`, `ContextOptions`, `AppDbContextFactory`
//!   - `identity`: users, roles, claims, logins and tokens
//! - **[`config`]**: `appsettings.json` loading and connection strings
//! - **[`error`]**: the [`CrmError`] taxonomy
//! - **[`legacy`]**: an unsalted digest helper kept for reference only
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use crm_data::{AppDbContextFactory, DesignTimeContextFactory, IdentityUser};
//!
//! // Reads ./appsettings.json -> ConnectionStrings:DefaultConnection
//! let ctx = AppDbContextFactory::new().create_context(&[])?;
//!
//! // Customers are staged and written on save
//! let mut fields = serde_json::Map::new();
//! fields.insert("name".into(), "Ada".into());
//! ctx.customers().add(fields);
//! let summary = ctx.save_changes()?;
//!
//! // Identity stores write immediately
//! let alice = ctx.users()?.create(IdentityUser::new("alice"))?;
//! ctx.user_roles()?.add_to_role(&alice.id, "Sales")?;
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod legacy;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{
    connection_string_from_json, AppSettings, CONNECTION_STRINGS_SECTION,
    DEFAULT_CONNECTION_NAME, SETTINGS_FILE_NAME,
};

// =============================================================================
// Errors
// =============================================================================

pub use error::{CrmError, Result};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Persistence context and design-time factory
pub use database::{
    AppDbContext, AppDbContextFactory, ContextOptions, ContextOptionsBuilder, DatabaseProvider,
    DesignTimeContextFactory,
};

// Application entities
pub use database::{Customer, CustomerFields, CustomerId, CustomerSet, SaveSummary};

// Schema management
pub use database::{SchemaManager, SchemaModule, SchemaStatus};

// Identity schema
pub use database::{
    Claim, IdentityRole, IdentityUser, IdentityUserLogin, RoleClaimStore, RoleStore,
    UserClaimStore, UserLoginStore, UserRoleStore, UserStore, UserTokenStore,
};

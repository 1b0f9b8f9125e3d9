//! Database module
//!
//! This module provides all data-access functionality, organized into:
//!
//! - **core**: Core database infrastructure (SQLite connections, connection strings, schema management)
//! - **context**: The persistence context, its options and the design-time factory
//! - **identity**: The identity/authentication schema and its stores
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/                  # Foundation
//! │   ├── connection         # SQLite DatabaseConn wrapper
//! │   ├── connection_string  # `key=value;` driver settings
//! │   └── schema             # SchemaModule composition and SchemaManager
//! │
//! ├── context/               # Persistence context
//! │   ├── options            # ContextOptions and builder
//! │   ├── customer           # Customer entity, tracked set, ApplicationSchema
//! │   └── factory            # DesignTimeContextFactory
//! │
//! └── identity/              # Identity schema module
//!     ├── users              # asp_net_users
//!     ├── roles              # asp_net_roles, asp_net_user_roles
//!     ├── claims             # asp_net_user_claims, asp_net_role_claims
//!     └── logins             # asp_net_user_logins, asp_net_user_tokens
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use crm_data::database::{AppDbContextFactory, DesignTimeContextFactory};
//!
//! let ctx = AppDbContextFactory::new().create_context(&[])?;
//!
//! let mut fields = serde_json::Map::new();
//! fields.insert("name".into(), "Ada".into());
//! ctx.customers().add(fields);
//!
//! let summary = ctx.save_changes()?;
//! let ada = ctx.customers().find(summary.inserted[0].id)?;
//! ```

pub mod context;
pub mod core;
pub mod identity;

pub use context::{
    schema_modules, AppDbContext, AppDbContextFactory, ApplicationSchema, ContextOptions,
    ContextOptionsBuilder, Customer, CustomerFields, CustomerId, CustomerSet, DatabaseProvider,
    DesignTimeContextFactory, SaveSummary,
};
pub use core::{
    DatabaseConn, OpenMode, SchemaManager, SchemaModule, SchemaStatus, SqliteConnectionString,
};
pub use identity::{
    Claim, IdentityRole, IdentitySchema, IdentityUser, IdentityUserLogin, RoleClaimStore,
    RoleStore, UserClaimStore, UserLoginStore, UserRoleStore, UserStore, UserTokenStore,
};

//! Identity and authentication schema
//!
//! The standard identity tables (users, roles, claims, logins, tokens) as a
//! separately-versioned schema module, plus stores for each table. Stores
//! write immediately; they do not take part in the context's staged
//! changes.
//!
//! Lookups by name use the normalized (upper-cased) form, so user and role
//! names are unique regardless of case.

mod claims;
mod logins;
mod roles;
mod users;

pub use claims::{Claim, RoleClaimStore, UserClaimStore};
pub use logins::{IdentityUserLogin, UserLoginStore, UserTokenStore};
pub use roles::{IdentityRole, RoleStore, UserRoleStore};
pub use users::{IdentityUser, UserStore};

use crate::database::core::SchemaModule;

/// Lookup form of a user name, email or role name
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

pub(crate) fn new_stamp() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Schema module for the identity tables
pub struct IdentitySchema;

impl SchemaModule for IdentitySchema {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn version(&self) -> u32 {
        1
    }

    fn tables(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (
                "asp_net_users",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_users (
                    id TEXT PRIMARY KEY,
                    user_name TEXT,
                    normalized_user_name TEXT,
                    email TEXT,
                    normalized_email TEXT,
                    email_confirmed INTEGER NOT NULL DEFAULT 0,
                    password_hash TEXT,
                    security_stamp TEXT,
                    concurrency_stamp TEXT,
                    phone_number TEXT,
                    phone_number_confirmed INTEGER NOT NULL DEFAULT 0,
                    two_factor_enabled INTEGER NOT NULL DEFAULT 0,
                    lockout_end INTEGER,
                    lockout_enabled INTEGER NOT NULL DEFAULT 0,
                    access_failed_count INTEGER NOT NULL DEFAULT 0
                );
                "#,
            ),
            (
                "asp_net_roles",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_roles (
                    id TEXT PRIMARY KEY,
                    name TEXT,
                    normalized_name TEXT,
                    concurrency_stamp TEXT
                );
                "#,
            ),
            (
                "asp_net_user_roles",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_user_roles (
                    user_id TEXT NOT NULL REFERENCES asp_net_users(id) ON DELETE CASCADE,
                    role_id TEXT NOT NULL REFERENCES asp_net_roles(id) ON DELETE CASCADE,
                    PRIMARY KEY (user_id, role_id)
                );
                "#,
            ),
            (
                "asp_net_user_claims",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_user_claims (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES asp_net_users(id) ON DELETE CASCADE,
                    claim_type TEXT NOT NULL,
                    claim_value TEXT NOT NULL
                );
                "#,
            ),
            (
                "asp_net_role_claims",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_role_claims (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    role_id TEXT NOT NULL REFERENCES asp_net_roles(id) ON DELETE CASCADE,
                    claim_type TEXT NOT NULL,
                    claim_value TEXT NOT NULL
                );
                "#,
            ),
            (
                "asp_net_user_logins",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_user_logins (
                    login_provider TEXT NOT NULL,
                    provider_key TEXT NOT NULL,
                    provider_display_name TEXT,
                    user_id TEXT NOT NULL REFERENCES asp_net_users(id) ON DELETE CASCADE,
                    PRIMARY KEY (login_provider, provider_key)
                );
                "#,
            ),
            (
                "asp_net_user_tokens",
                r#"
                CREATE TABLE IF NOT EXISTS asp_net_user_tokens (
                    user_id TEXT NOT NULL REFERENCES asp_net_users(id) ON DELETE CASCADE,
                    login_provider TEXT NOT NULL,
                    name TEXT NOT NULL,
                    value TEXT,
                    PRIMARY KEY (user_id, login_provider, name)
                );
                "#,
            ),
        ]
    }

    fn indexes(&self) -> &'static [&'static str] {
        &[
            "CREATE UNIQUE INDEX IF NOT EXISTS user_name_index ON asp_net_users(normalized_user_name)",
            "CREATE INDEX IF NOT EXISTS email_index ON asp_net_users(normalized_email)",
            "CREATE UNIQUE INDEX IF NOT EXISTS role_name_index ON asp_net_roles(normalized_name)",
            "CREATE INDEX IF NOT EXISTS idx_user_roles_role_id ON asp_net_user_roles(role_id)",
            "CREATE INDEX IF NOT EXISTS idx_user_claims_user_id ON asp_net_user_claims(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_role_claims_role_id ON asp_net_role_claims(role_id)",
            "CREATE INDEX IF NOT EXISTS idx_user_logins_user_id ON asp_net_user_logins(user_id)",
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" alice@Example.com "), "ALICE@EXAMPLE.COM");
    }

    #[test]
    fn test_identity_schema_is_current_after_initialize() {
        use crate::database::core::{SchemaManager, SchemaStatus};

        let db = test_support::identity_db();
        let manager = SchemaManager::new(&db.conn, vec![&IdentitySchema as &dyn SchemaModule]);
        assert_eq!(manager.check_status().unwrap(), SchemaStatus::Current);
        assert!(db.table_exists("asp_net_user_tokens").unwrap());
    }
}

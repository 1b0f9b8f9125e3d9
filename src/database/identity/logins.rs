//! External logins and authentication tokens

use super::users::{user_from_row, USER_COLUMNS};
use super::IdentityUser;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A login through an external provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUserLogin {
    pub login_provider: String,
    pub provider_key: String,
    pub provider_display_name: Option<String>,
    pub user_id: String,
}

/// Store for `asp_net_user_logins`
pub struct UserLoginStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserLoginStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// A provider key can belong to one user only
    pub fn add(&self, login: &IdentityUserLogin) -> Result<()> {
        self.conn.execute(
            "INSERT INTO asp_net_user_logins
                (login_provider, provider_key, provider_display_name, user_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                login.login_provider,
                login.provider_key,
                login.provider_display_name,
                login.user_id
            ],
        )?;
        Ok(())
    }

    pub fn remove(&self, user_id: &str, login_provider: &str, provider_key: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM asp_net_user_logins
             WHERE user_id = ?1 AND login_provider = ?2 AND provider_key = ?3",
            [user_id, login_provider, provider_key],
        )?;
        Ok(n > 0)
    }

    pub fn logins_for(&self, user_id: &str) -> Result<Vec<IdentityUserLogin>> {
        let mut stmt = self.conn.prepare(
            "SELECT login_provider, provider_key, provider_display_name, user_id
             FROM asp_net_user_logins WHERE user_id = ?1
             ORDER BY login_provider, provider_key",
        )?;
        let logins = stmt
            .query_map([user_id], |row| {
                Ok(IdentityUserLogin {
                    login_provider: row.get(0)?,
                    provider_key: row.get(1)?,
                    provider_display_name: row.get(2)?,
                    user_id: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logins)
    }

    /// The user owning an external login
    pub fn find_user(&self, login_provider: &str, provider_key: &str) -> Result<Option<IdentityUser>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM asp_net_users u
                     JOIN asp_net_user_logins l ON l.user_id = u.id
                     WHERE l.login_provider = ?1 AND l.provider_key = ?2",
                    USER_COLUMNS
                ),
                [login_provider, provider_key],
                user_from_row,
            )
            .optional()?)
    }
}

/// Store for `asp_net_user_tokens`
pub struct UserTokenStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserTokenStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or overwrite a token
    pub fn set(&self, user_id: &str, login_provider: &str, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO asp_net_user_tokens (user_id, login_provider, name, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, login_provider, name) DO UPDATE SET value = excluded.value",
            [user_id, login_provider, name, value],
        )?;
        Ok(())
    }

    pub fn get(&self, user_id: &str, login_provider: &str, name: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT value FROM asp_net_user_tokens
                 WHERE user_id = ?1 AND login_provider = ?2 AND name = ?3",
                [user_id, login_provider, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn remove(&self, user_id: &str, login_provider: &str, name: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM asp_net_user_tokens
             WHERE user_id = ?1 AND login_provider = ?2 AND name = ?3",
            [user_id, login_provider, name],
        )?;
        Ok(n > 0)
    }
}

//! Identity users

use super::{new_stamp, normalize};
use crate::error::{CrmError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A user account in the identity schema
///
/// `password_hash` is opaque to this crate: whatever the authentication
/// layer stores is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub user_name: Option<String>,
    pub normalized_user_name: Option<String>,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub security_stamp: Option<String>,
    pub concurrency_stamp: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    pub access_failed_count: i32,
}

impl IdentityUser {
    /// New user with fresh id and stamps
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: Some(user_name.into()),
            normalized_user_name: None,
            email: None,
            normalized_email: None,
            email_confirmed: false,
            password_hash: None,
            security_stamp: Some(new_stamp()),
            concurrency_stamp: Some(new_stamp()),
            phone_number: None,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            lockout_enabled: true,
            access_failed_count: 0,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether the user is locked out at `now`
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }

    fn normalize_names(&mut self) {
        self.normalized_user_name = self.user_name.as_deref().map(normalize);
        self.normalized_email = self.email.as_deref().map(normalize);
    }
}

pub(crate) const USER_COLUMNS: &str = "u.id, u.user_name, u.normalized_user_name, u.email, \
     u.normalized_email, u.email_confirmed, u.password_hash, u.security_stamp, \
     u.concurrency_stamp, u.phone_number, u.phone_number_confirmed, u.two_factor_enabled, \
     u.lockout_end, u.lockout_enabled, u.access_failed_count";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityUser> {
    let lockout_end: Option<i64> = row.get(12)?;
    Ok(IdentityUser {
        id: row.get(0)?,
        user_name: row.get(1)?,
        normalized_user_name: row.get(2)?,
        email: row.get(3)?,
        normalized_email: row.get(4)?,
        email_confirmed: row.get(5)?,
        password_hash: row.get(6)?,
        security_stamp: row.get(7)?,
        concurrency_stamp: row.get(8)?,
        phone_number: row.get(9)?,
        phone_number_confirmed: row.get(10)?,
        two_factor_enabled: row.get(11)?,
        lockout_end: lockout_end
            .map(|secs| {
                DateTime::from_timestamp(secs, 0)
                    .ok_or(rusqlite::Error::IntegralValueOutOfRange(12, secs))
            })
            .transpose()?,
        lockout_enabled: row.get(13)?,
        access_failed_count: row.get(14)?,
    })
}

/// Store for `asp_net_users`
pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a user, filling in the normalized names
    ///
    /// A duplicate user name fails with a constraint violation.
    pub fn create(&self, mut user: IdentityUser) -> Result<IdentityUser> {
        user.normalize_names();
        if user.concurrency_stamp.is_none() {
            user.concurrency_stamp = Some(new_stamp());
        }

        self.conn.execute(
            "INSERT INTO asp_net_users (
                id, user_name, normalized_user_name, email, normalized_email,
                email_confirmed, password_hash, security_stamp, concurrency_stamp,
                phone_number, phone_number_confirmed, two_factor_enabled,
                lockout_end, lockout_enabled, access_failed_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                user.id,
                user.user_name,
                user.normalized_user_name,
                user.email,
                user.normalized_email,
                user.email_confirmed,
                user.password_hash,
                user.security_stamp,
                user.concurrency_stamp,
                user.phone_number,
                user.phone_number_confirmed,
                user.two_factor_enabled,
                user.lockout_end.map(|t| t.timestamp()),
                user.lockout_enabled,
                user.access_failed_count,
            ],
        )?;
        Ok(user)
    }

    /// Update a user if its concurrency stamp is unchanged in the store
    ///
    /// Returns the stored user with a fresh concurrency stamp.
    pub fn update(&self, mut user: IdentityUser) -> Result<IdentityUser> {
        user.normalize_names();
        let expected = user.concurrency_stamp.take();
        user.concurrency_stamp = Some(new_stamp());

        let n = self.conn.execute(
            "UPDATE asp_net_users SET
                user_name = ?2, normalized_user_name = ?3, email = ?4, normalized_email = ?5,
                email_confirmed = ?6, password_hash = ?7, security_stamp = ?8,
                concurrency_stamp = ?9, phone_number = ?10, phone_number_confirmed = ?11,
                two_factor_enabled = ?12, lockout_end = ?13, lockout_enabled = ?14,
                access_failed_count = ?15
             WHERE id = ?1 AND concurrency_stamp IS ?16",
            params![
                user.id,
                user.user_name,
                user.normalized_user_name,
                user.email,
                user.normalized_email,
                user.email_confirmed,
                user.password_hash,
                user.security_stamp,
                user.concurrency_stamp,
                user.phone_number,
                user.phone_number_confirmed,
                user.two_factor_enabled,
                user.lockout_end.map(|t| t.timestamp()),
                user.lockout_enabled,
                user.access_failed_count,
                expected,
            ],
        )?;

        if n == 0 {
            return Err(CrmError::conflict("user", &user.id));
        }
        Ok(user)
    }

    /// Delete a user and, by cascade, its roles, claims, logins and tokens
    pub fn delete(&self, user: &IdentityUser) -> Result<()> {
        let n = self.conn.execute(
            "DELETE FROM asp_net_users WHERE id = ?1 AND concurrency_stamp IS ?2",
            params![user.id, user.concurrency_stamp],
        )?;
        if n == 0 {
            return Err(CrmError::conflict("user", &user.id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<IdentityUser>> {
        self.find_one("u.id = ?1", id)
    }

    /// Look up by user name, ignoring case
    pub fn find_by_name(&self, user_name: &str) -> Result<Option<IdentityUser>> {
        self.find_one("u.normalized_user_name = ?1", &normalize(user_name))
    }

    /// Look up by email, ignoring case
    ///
    /// Emails are not unique; the first match by id is returned.
    pub fn find_by_email(&self, email: &str) -> Result<Option<IdentityUser>> {
        self.find_one("u.normalized_email = ?1", &normalize(email))
    }

    pub fn list(&self) -> Result<Vec<IdentityUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM asp_net_users u ORDER BY u.normalized_user_name",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM asp_net_users", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn find_one(&self, predicate: &str, value: &str) -> Result<Option<IdentityUser>> {
        let sql = format!(
            "SELECT {} FROM asp_net_users u WHERE {} ORDER BY u.id LIMIT 1",
            USER_COLUMNS, predicate
        );
        Ok(self
            .conn
            .query_row(&sql, [value], user_from_row)
            .optional()?)
    }
}

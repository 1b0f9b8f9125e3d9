//! Identity roles and role membership

use super::users::{user_from_row, USER_COLUMNS};
use super::{new_stamp, normalize, IdentityUser};
use crate::error::{CrmError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRole {
    pub id: String,
    pub name: Option<String>,
    pub normalized_name: Option<String>,
    pub concurrency_stamp: Option<String>,
}

impl IdentityRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: Some(name.into()),
            normalized_name: None,
            concurrency_stamp: Some(new_stamp()),
        }
    }
}

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityRole> {
    Ok(IdentityRole {
        id: row.get(0)?,
        name: row.get(1)?,
        normalized_name: row.get(2)?,
        concurrency_stamp: row.get(3)?,
    })
}

/// Store for `asp_net_roles`
pub struct RoleStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoleStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn create(&self, mut role: IdentityRole) -> Result<IdentityRole> {
        role.normalized_name = role.name.as_deref().map(normalize);
        if role.concurrency_stamp.is_none() {
            role.concurrency_stamp = Some(new_stamp());
        }
        self.conn.execute(
            "INSERT INTO asp_net_roles (id, name, normalized_name, concurrency_stamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![role.id, role.name, role.normalized_name, role.concurrency_stamp],
        )?;
        Ok(role)
    }

    /// Rename a role, guarded by its concurrency stamp
    pub fn update(&self, mut role: IdentityRole) -> Result<IdentityRole> {
        role.normalized_name = role.name.as_deref().map(normalize);
        let expected = role.concurrency_stamp.replace(new_stamp());

        let n = self.conn.execute(
            "UPDATE asp_net_roles SET name = ?2, normalized_name = ?3, concurrency_stamp = ?4
             WHERE id = ?1 AND concurrency_stamp IS ?5",
            params![
                role.id,
                role.name,
                role.normalized_name,
                role.concurrency_stamp,
                expected
            ],
        )?;
        if n == 0 {
            return Err(CrmError::conflict("role", &role.id));
        }
        Ok(role)
    }

    pub fn delete(&self, role: &IdentityRole) -> Result<()> {
        let n = self.conn.execute(
            "DELETE FROM asp_net_roles WHERE id = ?1 AND concurrency_stamp IS ?2",
            params![role.id, role.concurrency_stamp],
        )?;
        if n == 0 {
            return Err(CrmError::conflict("role", &role.id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<IdentityRole>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, normalized_name, concurrency_stamp FROM asp_net_roles WHERE id = ?1",
                [id],
                role_from_row,
            )
            .optional()?)
    }

    /// Look up by role name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Result<Option<IdentityRole>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, normalized_name, concurrency_stamp FROM asp_net_roles
                 WHERE normalized_name = ?1",
                [normalize(name)],
                role_from_row,
            )
            .optional()?)
    }

    pub fn list(&self) -> Result<Vec<IdentityRole>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, normalized_name, concurrency_stamp FROM asp_net_roles
             ORDER BY normalized_name",
        )?;
        let roles = stmt
            .query_map([], role_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(roles)
    }
}

/// Store for `asp_net_user_roles`
///
/// Roles are addressed by name, as identity APIs do.
pub struct UserRoleStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserRoleStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Add a user to a role; fails if the role does not exist
    pub fn add_to_role(&self, user_id: &str, role_name: &str) -> Result<()> {
        let role_id = self.role_id(role_name)?;
        self.conn.execute(
            "INSERT INTO asp_net_user_roles (user_id, role_id) VALUES (?1, ?2)",
            [user_id, role_id.as_str()],
        )?;
        Ok(())
    }

    /// Returns `true` if the membership existed
    pub fn remove_from_role(&self, user_id: &str, role_name: &str) -> Result<bool> {
        let role_id = self.role_id(role_name)?;
        let n = self.conn.execute(
            "DELETE FROM asp_net_user_roles WHERE user_id = ?1 AND role_id = ?2",
            [user_id, role_id.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn is_in_role(&self, user_id: &str, role_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM asp_net_user_roles ur
             JOIN asp_net_roles r ON r.id = ur.role_id
             WHERE ur.user_id = ?1 AND r.normalized_name = ?2",
            [user_id, normalize(role_name).as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of the user's roles, sorted
    pub fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.name FROM asp_net_user_roles ur
             JOIN asp_net_roles r ON r.id = ur.role_id
             WHERE ur.user_id = ?1 AND r.name IS NOT NULL
             ORDER BY r.normalized_name",
        )?;
        let names = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn users_in_role(&self, role_name: &str) -> Result<Vec<IdentityUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM asp_net_users u
             JOIN asp_net_user_roles ur ON ur.user_id = u.id
             JOIN asp_net_roles r ON r.id = ur.role_id
             WHERE r.normalized_name = ?1
             ORDER BY u.normalized_user_name",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([normalize(role_name)], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn role_id(&self, role_name: &str) -> Result<String> {
        self.conn
            .query_row(
                "SELECT id FROM asp_net_roles WHERE normalized_name = ?1",
                [normalize(role_name)],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| CrmError::not_found("role", role_name))
    }
}

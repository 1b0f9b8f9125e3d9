//! User and role claims

use super::users::{user_from_row, USER_COLUMNS};
use super::IdentityUser;
use crate::error::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Claims attached to an owner row (`user_id` or `role_id`)
struct ClaimTable {
    table: &'static str,
    owner: &'static str,
}

impl ClaimTable {
    fn add(&self, conn: &Connection, owner_id: &str, claims: &[Claim]) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, claim_type, claim_value) VALUES (?1, ?2, ?3)",
                self.table, self.owner
            ))?;
            for claim in claims {
                stmt.execute(params![owner_id, claim.claim_type, claim.value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list(&self, conn: &Connection, owner_id: &str) -> Result<Vec<Claim>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT claim_type, claim_value FROM {} WHERE {} = ?1 ORDER BY id",
            self.table, self.owner
        ))?;
        let claims = stmt
            .query_map([owner_id], |row| {
                Ok(Claim {
                    claim_type: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(claims)
    }

    fn remove(&self, conn: &Connection, owner_id: &str, claim: &Claim) -> Result<usize> {
        Ok(conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND claim_type = ?2 AND claim_value = ?3",
                self.table, self.owner
            ),
            params![owner_id, claim.claim_type, claim.value],
        )?)
    }
}

const USER_CLAIMS: ClaimTable = ClaimTable {
    table: "asp_net_user_claims",
    owner: "user_id",
};

const ROLE_CLAIMS: ClaimTable = ClaimTable {
    table: "asp_net_role_claims",
    owner: "role_id",
};

/// Store for `asp_net_user_claims`
pub struct UserClaimStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserClaimStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Add claims atomically
    pub fn add(&self, user_id: &str, claims: &[Claim]) -> Result<()> {
        USER_CLAIMS.add(self.conn, user_id, claims)
    }

    pub fn claims_for(&self, user_id: &str) -> Result<Vec<Claim>> {
        USER_CLAIMS.list(self.conn, user_id)
    }

    /// Remove every copy of `claim`; returns how many rows went
    pub fn remove(&self, user_id: &str, claim: &Claim) -> Result<usize> {
        USER_CLAIMS.remove(self.conn, user_id, claim)
    }

    /// Replace every copy of `claim` with `new_claim`
    pub fn replace(&self, user_id: &str, claim: &Claim, new_claim: &Claim) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE asp_net_user_claims SET claim_type = ?4, claim_value = ?5
             WHERE user_id = ?1 AND claim_type = ?2 AND claim_value = ?3",
            params![
                user_id,
                claim.claim_type,
                claim.value,
                new_claim.claim_type,
                new_claim.value
            ],
        )?)
    }

    pub fn users_for_claim(&self, claim: &Claim) -> Result<Vec<IdentityUser>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {} FROM asp_net_users u
             JOIN asp_net_user_claims c ON c.user_id = u.id
             WHERE c.claim_type = ?1 AND c.claim_value = ?2
             ORDER BY u.normalized_user_name",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([&claim.claim_type, &claim.value], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

/// Store for `asp_net_role_claims`
pub struct RoleClaimStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoleClaimStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn add(&self, role_id: &str, claim: &Claim) -> Result<()> {
        ROLE_CLAIMS.add(self.conn, role_id, std::slice::from_ref(claim))
    }

    pub fn claims_for(&self, role_id: &str) -> Result<Vec<Claim>> {
        ROLE_CLAIMS.list(self.conn, role_id)
    }

    pub fn remove(&self, role_id: &str, claim: &Claim) -> Result<usize> {
        ROLE_CLAIMS.remove(self.conn, role_id, claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::identity::test_support::identity_db;
    use crate::database::identity::{IdentityRole, RoleStore, UserStore};

    #[test]
    fn test_user_claims() {
        let db = identity_db();
        let users = UserStore::new(&db.conn);
        let claims = UserClaimStore::new(&db.conn);
        let alice = users.create(IdentityUser::new("alice")).unwrap();

        let region = Claim::new("region", "emea");
        let tier = Claim::new("tier", "gold");
        claims.add(&alice.id, &[region.clone(), tier.clone()]).unwrap();
        assert_eq!(
            claims.claims_for(&alice.id).unwrap(),
            vec![region.clone(), tier.clone()]
        );

        let apac = Claim::new("region", "apac");
        assert_eq!(claims.replace(&alice.id, &region, &apac).unwrap(), 1);
        assert_eq!(claims.users_for_claim(&apac).unwrap()[0].id, alice.id);
        assert!(claims.users_for_claim(&region).unwrap().is_empty());

        assert_eq!(claims.remove(&alice.id, &tier).unwrap(), 1);
        assert_eq!(claims.claims_for(&alice.id).unwrap(), vec![apac]);
    }

    #[test]
    fn test_claims_for_unknown_user_are_rejected() {
        let db = identity_db();
        let claims = UserClaimStore::new(&db.conn);

        let err = claims
            .add("no-such-user", &[Claim::new("a", "b")])
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.table_count("asp_net_user_claims").unwrap(), 0);
    }

    #[test]
    fn test_role_claims() {
        let db = identity_db();
        let roles = RoleStore::new(&db.conn);
        let claims = RoleClaimStore::new(&db.conn);
        let admin = roles.create(IdentityRole::new("Admin")).unwrap();

        let perm = Claim::new("permission", "customers.write");
        claims.add(&admin.id, &perm).unwrap();
        assert_eq!(claims.claims_for(&admin.id).unwrap(), vec![perm.clone()]);

        roles.delete(&admin).unwrap();
        assert!(claims.claims_for(&admin.id).unwrap().is_empty());
    }
}

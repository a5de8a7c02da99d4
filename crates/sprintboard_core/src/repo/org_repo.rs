//! Organization, user and organization-admin persistence.
//!
//! # Invariants
//! - An admin must be a user of the same organization.
//! - Admin rows are a set: re-adding an admin is a no-op.

use crate::model::actor::UserId;
use crate::model::organization::{Organization, OrganizationId, User};
use crate::model::normalize_name;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Repository interface for organizations and their members.
pub trait OrgRepository {
    fn create_organization(&self, organization: &Organization) -> RepoResult<OrganizationId>;
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Grants organization-admin status. Returns `false` if already granted.
    fn add_org_admin(&self, organization_id: OrganizationId, user_id: UserId) -> RepoResult<bool>;
    /// Revokes organization-admin status. Returns `false` if not granted.
    fn remove_org_admin(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<bool>;
    fn list_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrgRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrgRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrgRepository for SqliteOrgRepository<'_> {
    fn create_organization(&self, organization: &Organization) -> RepoResult<OrganizationId> {
        let name = normalize_name(&organization.name)?;
        self.conn.execute(
            "INSERT INTO organizations (org_uuid, name) VALUES (?1, ?2);",
            params![organization.id.to_string(), name],
        )?;
        Ok(organization.id)
    }

    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        let display_name = normalize_name(&user.display_name)?;
        self.conn.execute(
            "INSERT INTO users (user_uuid, org_uuid, display_name) VALUES (?1, ?2, ?3);",
            params![
                user.id.to_string(),
                user.organization_id.to_string(),
                display_name
            ],
        )?;
        Ok(user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT org_uuid, display_name FROM users WHERE user_uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((org_text, display_name)) => Ok(Some(User {
                id,
                organization_id: parse_uuid(&org_text, "users.org_uuid")?,
                display_name,
            })),
        }
    }

    fn add_org_admin(&self, organization_id: OrganizationId, user_id: UserId) -> RepoResult<bool> {
        let user = self
            .get_user(user_id)?
            .ok_or_else(|| RepoError::not_found("user", user_id))?;
        if user.organization_id != organization_id {
            return Err(RepoError::InvalidData(format!(
                "user {user_id} does not belong to organization {organization_id}"
            )));
        }

        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO org_admins (org_uuid, user_uuid) VALUES (?1, ?2);",
            params![organization_id.to_string(), user_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn remove_org_admin(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM org_admins WHERE org_uuid = ?1 AND user_uuid = ?2;",
            params![organization_id.to_string(), user_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn list_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>> {
        load_org_admins(self.conn, organization_id)
    }
}

pub(crate) fn load_org_admins(
    conn: &Connection,
    organization_id: OrganizationId,
) -> RepoResult<BTreeSet<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_uuid
         FROM org_admins
         WHERE org_uuid = ?1;",
    )?;
    let mut rows = stmt.query([organization_id.to_string()])?;
    let mut admins = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        admins.insert(parse_uuid(&value, "org_admins.user_uuid")?);
    }
    Ok(admins)
}

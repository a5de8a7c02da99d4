//! Read interface consumed by scheduling and access resolution.
//!
//! # Responsibility
//! - Expose the three lookups the pure rules need, and nothing else.
//! - Let rules run against SQLite in production and in-memory fakes in tests.
//!
//! # Invariants
//! - Implementations perform reads only.

use crate::model::actor::UserId;
use crate::model::iteration::Iteration;
use crate::model::organization::OrganizationId;
use crate::model::work_item::{WorkItem, WorkItemId};
use crate::repo::iteration_repo::list_project_iterations;
use crate::repo::org_repo::load_org_admins;
use crate::repo::work_item_repo::load_work_item;
use crate::repo::RepoResult;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Storage lookups needed by iteration validation and participant resolution.
pub trait TrackerStore {
    /// Lists every iteration of a project.
    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>>;
    /// Loads one work item with its direct participants.
    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>>;
    /// Loads the admin set of one organization.
    fn get_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>>;
}

/// SQLite-backed tracker store.
///
/// Built over a `Connection` or, through deref, an open `Transaction`.
pub struct SqliteTrackerStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTrackerStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TrackerStore for SqliteTrackerStore<'_> {
    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>> {
        list_project_iterations(self.conn, project_id)
    }

    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>> {
        load_work_item(self.conn, id)
    }

    fn get_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>> {
        load_org_admins(self.conn, organization_id)
    }
}

impl<S: TrackerStore + ?Sized> TrackerStore for &S {
    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>> {
        (**self).list_iterations(project_id)
    }

    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>> {
        (**self).get_work_item(id)
    }

    fn get_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>> {
        (**self).get_org_admins(organization_id)
    }
}

//! In-memory `TrackerStore` used by unit tests of the pure rules.

use crate::model::actor::UserId;
use crate::model::iteration::Iteration;
use crate::model::organization::OrganizationId;
use crate::model::work_item::{WorkItem, WorkItemId};
use crate::repo::tracker_store::TrackerStore;
use crate::repo::RepoResult;
use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
pub(crate) struct MemoryStore {
    items: HashMap<WorkItemId, WorkItem>,
    iterations: Vec<Iteration>,
    admins: HashMap<OrganizationId, BTreeSet<UserId>>,
    item_reads: Cell<usize>,
}

impl MemoryStore {
    pub(crate) fn insert_item(&mut self, item: WorkItem) {
        self.items.insert(item.id, item);
    }

    pub(crate) fn insert_iteration(&mut self, iteration: Iteration) {
        self.iterations.push(iteration);
    }

    pub(crate) fn set_admins(&mut self, organization_id: OrganizationId, admins: &[UserId]) {
        self.admins
            .insert(organization_id, admins.iter().copied().collect());
    }

    pub(crate) fn item_reads(&self) -> usize {
        self.item_reads.get()
    }
}

impl TrackerStore for MemoryStore {
    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>> {
        Ok(self
            .iterations
            .iter()
            .filter(|iteration| iteration.project_id == project_id)
            .cloned()
            .collect())
    }

    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>> {
        self.item_reads.set(self.item_reads.get() + 1);
        Ok(self.items.get(&id).cloned())
    }

    fn get_org_admins(&self, organization_id: OrganizationId) -> RepoResult<BTreeSet<UserId>> {
        Ok(self
            .admins
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub(crate) fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

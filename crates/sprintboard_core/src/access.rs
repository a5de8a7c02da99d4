//! Participant set resolution over the work tree.
//!
//! # Responsibility
//! - Compute who may view or act on a work item.
//! - Detect corrupt hierarchies instead of looping on them.
//!
//! # Invariants
//! - Effective participants = direct participants, plus the admins of the
//!   item's organization, plus the effective participants of its parent.
//! - Each organization's admin set is read once per resolver.
//! - A resolver memoizes only for its own lifetime (one request). Membership
//!   is mutable, so nothing is cached across requests.
//! - Walks stop at `MAX_HIERARCHY_DEPTH` levels or on a repeated node.

use crate::model::actor::{Actor, UserId};
use crate::model::organization::OrganizationId;
use crate::model::work_item::{WorkItem, WorkItemId};
use crate::repo::tracker_store::TrackerStore;
use crate::repo::RepoError;
use log::warn;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deepest parent chain accepted before the hierarchy is treated as corrupt.
pub const MAX_HIERARCHY_DEPTH: usize = 32;

/// What is wrong with a parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyFault {
    /// The chain revisits `repeated`.
    Cycle { repeated: WorkItemId },
    /// The chain is longer than `max_depth` levels.
    TooDeep { max_depth: usize },
}

/// Errors from participant resolution.
#[derive(Debug)]
pub enum ParticipantError {
    /// The parent chain starting at `item_id` is cyclic or unbounded.
    InvalidHierarchy {
        item_id: WorkItemId,
        fault: HierarchyFault,
    },
    /// The item, or one of its ancestors, does not exist.
    NotFound(WorkItemId),
    Store(RepoError),
}

impl Display for ParticipantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHierarchy {
                item_id,
                fault: HierarchyFault::Cycle { repeated },
            } => write!(
                f,
                "invalid hierarchy for {item_id}: parent chain revisits {repeated}"
            ),
            Self::InvalidHierarchy {
                item_id,
                fault: HierarchyFault::TooDeep { max_depth },
            } => write!(
                f,
                "invalid hierarchy for {item_id}: deeper than {max_depth} levels"
            ),
            Self::NotFound(id) => write!(f, "work item not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ParticipantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ParticipantError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Resolves the effective participant set of one work item.
///
/// Convenience wrapper over a single-use [`ParticipantResolver`].
pub fn resolve_participants<S: TrackerStore>(
    store: S,
    item_id: WorkItemId,
) -> Result<BTreeSet<UserId>, ParticipantError> {
    ParticipantResolver::new(store).resolve(item_id)
}

/// Returns whether the actor administers their own organization.
pub fn is_org_admin<S: TrackerStore>(store: &S, actor: &Actor) -> Result<bool, RepoError> {
    Ok(store
        .get_org_admins(actor.organization_id)?
        .contains(&actor.user_id))
}

/// Request-scoped participant resolver with memoization.
///
/// Resolving several items that share ancestors (a task list, a project and
/// its children) walks each ancestor once. Drop it at the end of the request.
pub struct ParticipantResolver<S> {
    store: S,
    resolved: HashMap<WorkItemId, Resolved>,
    org_admins: HashMap<OrganizationId, BTreeSet<UserId>>,
}

/// A memoized item: its depth (a root is 1) and its effective participants.
#[derive(Debug, Clone, Default)]
struct Resolved {
    depth: usize,
    participants: BTreeSet<UserId>,
}

impl<S: TrackerStore> ParticipantResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            resolved: HashMap::new(),
            org_admins: HashMap::new(),
        }
    }

    /// Returns the effective participants of `item_id`.
    ///
    /// # Errors
    /// - `NotFound` when the item or an ancestor is missing.
    /// - `InvalidHierarchy` on a cyclic or over-deep parent chain.
    pub fn resolve(&mut self, item_id: WorkItemId) -> Result<BTreeSet<UserId>, ParticipantError> {
        if let Some(cached) = self.resolved.get(&item_id) {
            return Ok(cached.participants.clone());
        }

        let (chain, mut inherited) = self.load_unresolved_chain(item_id)?;

        for item in chain.into_iter().rev() {
            let admins = self.admins_of(item.organization_id)?;
            let mut participants = inherited.participants;
            participants.extend(item.participants.iter().copied());
            participants.extend(admins.iter().copied());
            let resolved = Resolved {
                depth: inherited.depth + 1,
                participants,
            };
            self.resolved.insert(item.id, resolved.clone());
            inherited = resolved;
        }

        Ok(inherited.participants)
    }

    /// Returns whether `actor` is an effective participant of `item_id`.
    pub fn can_access(
        &mut self,
        actor: &Actor,
        item_id: WorkItemId,
    ) -> Result<bool, ParticipantError> {
        Ok(self.resolve(item_id)?.contains(&actor.user_id))
    }

    /// Walks upward from `item_id` until a root or an already-resolved
    /// ancestor. Returns the unresolved items bottom-up, and the resolved
    /// ancestor where the walk stopped (depth 0 and no participants at a
    /// root).
    ///
    /// The depth bound covers the whole chain, cached ancestors included.
    fn load_unresolved_chain(
        &self,
        item_id: WorkItemId,
    ) -> Result<(Vec<WorkItem>, Resolved), ParticipantError> {
        let mut chain: Vec<WorkItem> = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(item_id);

        while let Some(current) = cursor {
            if let Some(cached) = self.resolved.get(&current) {
                if chain.len() + cached.depth > MAX_HIERARCHY_DEPTH {
                    return Err(self.too_deep(item_id));
                }
                return Ok((chain, cached.clone()));
            }
            if !visited.insert(current) {
                return Err(self.invalid_hierarchy(
                    item_id,
                    HierarchyFault::Cycle { repeated: current },
                ));
            }
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                return Err(self.too_deep(item_id));
            }

            let item = self
                .store
                .get_work_item(current)?
                .ok_or(ParticipantError::NotFound(current))?;
            cursor = item.parent_id;
            chain.push(item);
        }

        Ok((chain, Resolved::default()))
    }

    fn admins_of(
        &mut self,
        organization_id: OrganizationId,
    ) -> Result<&BTreeSet<UserId>, ParticipantError> {
        let admins = match self.org_admins.entry(organization_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.store.get_org_admins(organization_id)?),
        };
        Ok(admins)
    }

    fn invalid_hierarchy(&self, item_id: WorkItemId, fault: HierarchyFault) -> ParticipantError {
        warn!(
            "event=participants_resolve module=access status=error error_code=invalid_hierarchy item={item_id}"
        );
        ParticipantError::InvalidHierarchy { item_id, fault }
    }

    fn too_deep(&self, item_id: WorkItemId) -> ParticipantError {
        self.invalid_hierarchy(
            item_id,
            HierarchyFault::TooDeep {
                max_depth: MAX_HIERARCHY_DEPTH,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        resolve_participants, HierarchyFault, ParticipantError, ParticipantResolver,
        MAX_HIERARCHY_DEPTH,
    };
    use crate::model::actor::Actor;
    use crate::model::work_item::{WorkItem, WorkItemKind};
    use crate::testing::MemoryStore;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn with_participants(mut item: WorkItem, users: &[Uuid]) -> WorkItem {
        item.participants.extend(users.iter().copied());
        item
    }

    #[test]
    fn root_project_unions_direct_participants_and_org_admins() {
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let org = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let project = with_participants(WorkItem::new_project(org, "Tracker"), &[u1, u2]);
        store.insert_item(project.clone());
        store.set_admins(org, &[u3]);

        let resolved = resolve_participants(&store, project.id).unwrap();
        assert_eq!(resolved, BTreeSet::from([u1, u2, u3]));
    }

    #[test]
    fn task_inherits_project_participants() {
        let (u1, u2, admin) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let org = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let project = with_participants(WorkItem::new_project(org, "Tracker"), &[u1]);
        let task = with_participants(
            WorkItem::new_child(WorkItemKind::Task, &project, "Fix login"),
            &[u2],
        );
        store.insert_item(project.clone());
        store.insert_item(task.clone());
        store.set_admins(org, &[admin]);

        let resolved = resolve_participants(&store, task.id).unwrap();
        assert_eq!(resolved, BTreeSet::from([u1, u2, admin]));

        let project_only = resolve_participants(&store, project.id).unwrap();
        assert!(!project_only.contains(&u2));
    }

    #[test]
    fn cyclic_parent_chain_is_reported() {
        let org = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let mut a = WorkItem::new_project(org, "A");
        let b = WorkItem::new_child(WorkItemKind::Task, &a, "B");
        a.parent_id = Some(b.id);
        store.insert_item(a.clone());
        store.insert_item(b.clone());

        let err = resolve_participants(&store, b.id).unwrap_err();
        assert!(matches!(
            err,
            ParticipantError::InvalidHierarchy {
                item_id,
                fault: HierarchyFault::Cycle { repeated },
            } if item_id == b.id && repeated == b.id
        ));
    }

    #[test]
    fn over_deep_chain_is_reported() {
        let org = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let mut parent = WorkItem::new_project(org, "Root");
        store.insert_item(parent.clone());
        for level in 0..MAX_HIERARCHY_DEPTH {
            let child = WorkItem::new_child(WorkItemKind::Project, &parent, format!("L{level}"));
            store.insert_item(child.clone());
            parent = child;
        }

        let err = resolve_participants(&store, parent.id).unwrap_err();
        assert!(matches!(
            err,
            ParticipantError::InvalidHierarchy {
                fault: HierarchyFault::TooDeep { max_depth },
                ..
            } if max_depth == MAX_HIERARCHY_DEPTH
        ));
    }

    /// Stores a chain of `len` items, root first, and returns their ids.
    fn store_chain(store: &mut MemoryStore, len: usize) -> Vec<Uuid> {
        let mut parent = WorkItem::new_project(Uuid::new_v4(), "Root");
        let mut ids = vec![parent.id];
        store.insert_item(parent.clone());
        for level in 1..len {
            let child = WorkItem::new_child(WorkItemKind::Task, &parent, format!("L{level}"));
            ids.push(child.id);
            store.insert_item(child.clone());
            parent = child;
        }
        ids
    }

    #[test]
    fn chain_of_exactly_max_depth_resolves() {
        let mut store = MemoryStore::default();
        let ids = store_chain(&mut store, MAX_HIERARCHY_DEPTH);
        let leaf = ids[MAX_HIERARCHY_DEPTH - 1];
        assert!(resolve_participants(&store, leaf).is_ok());

        let mut longer = MemoryStore::default();
        let ids = store_chain(&mut longer, MAX_HIERARCHY_DEPTH + 1);
        let err = resolve_participants(&longer, ids[MAX_HIERARCHY_DEPTH]).unwrap_err();
        assert!(matches!(
            err,
            ParticipantError::InvalidHierarchy {
                fault: HierarchyFault::TooDeep { .. },
                ..
            }
        ));
    }

    #[test]
    fn depth_limit_holds_after_resolving_a_middle_ancestor() {
        let mut store = MemoryStore::default();
        let ids = store_chain(&mut store, 41);
        let leaf = ids[40];

        let fresh = resolve_participants(&store, leaf);
        let mut resolver = ParticipantResolver::new(&store);
        resolver.resolve(ids[19]).unwrap();
        let warmed = resolver.resolve(leaf);

        assert!(fresh.is_err());
        assert!(matches!(
            warmed,
            Err(ParticipantError::InvalidHierarchy {
                fault: HierarchyFault::TooDeep { .. },
                ..
            })
        ));
    }

    #[test]
    fn cached_ancestor_counts_towards_depth_at_the_boundary() {
        let mut store = MemoryStore::default();
        let ids = store_chain(&mut store, MAX_HIERARCHY_DEPTH + 1);
        let mut resolver = ParticipantResolver::new(&store);

        resolver.resolve(ids[MAX_HIERARCHY_DEPTH - 1]).unwrap();
        assert!(resolver.resolve(ids[MAX_HIERARCHY_DEPTH]).is_err());
        assert!(resolver.resolve(ids[0]).is_ok());
    }

    #[test]
    fn missing_ancestor_is_not_found() {
        let org = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let ghost = WorkItem::new_project(org, "Ghost");
        let task = WorkItem::new_child(WorkItemKind::Task, &ghost, "Orphan");
        store.insert_item(task.clone());

        assert!(matches!(
            resolve_participants(&store, task.id),
            Err(ParticipantError::NotFound(id)) if id == ghost.id
        ));
    }

    #[test]
    fn resolver_reuses_resolved_ancestors_within_one_request() {
        let org = Uuid::new_v4();
        let member = Uuid::new_v4();
        let mut store = MemoryStore::default();
        let project = with_participants(WorkItem::new_project(org, "Tracker"), &[member]);
        let first = WorkItem::new_child(WorkItemKind::Task, &project, "First");
        let second = WorkItem::new_child(WorkItemKind::Task, &project, "Second");
        store.insert_item(project.clone());
        store.insert_item(first.clone());
        store.insert_item(second.clone());

        let mut resolver = ParticipantResolver::new(&store);
        let actor = Actor::new(member, org);
        assert!(resolver.can_access(&actor, first.id).unwrap());
        assert!(resolver.can_access(&actor, second.id).unwrap());
        assert!(resolver.can_access(&actor, project.id).unwrap());
        drop(resolver);

        assert_eq!(store.item_reads(), 3);
    }
}

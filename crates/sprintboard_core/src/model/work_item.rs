//! Work item domain model.
//!
//! # Responsibility
//! - Define the tree node shared by projects, tasks and stories.
//! - Define the closed set of field changes a task update may carry.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - Tasks and stories always have a parent; projects may be roots.
//! - An item is never its own parent.
//! - Only non-project items may reference an iteration.
//! - Deleted items are kept with `active = false` and hidden from services.
//! - A constraint window, when both ends are set, never ends before it starts.

use crate::model::actor::UserId;
use crate::model::iteration::IterationId;
use crate::model::organization::OrganizationId;
use crate::model::{normalize_name, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for every node of the work tree.
pub type WorkItemId = Uuid;

/// Kind of a work tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    /// Root container that owns iterations, tags and participants.
    Project,
    /// Actionable unit of work.
    Task,
    /// User story grouping work under a project.
    Story,
}

/// Open/closed lifecycle of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    Opened,
    Done,
}

/// Board column of an open task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    Backlog,
    Planning,
    InProgress,
    Review,
}

/// Canonical record for projects, tasks and stories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// Serialized as `type` to match the external JSON shape.
    #[serde(rename = "type")]
    pub kind: WorkItemKind,
    pub name: String,
    /// `None` only for root projects.
    pub parent_id: Option<WorkItemId>,
    pub organization_id: OrganizationId,
    /// Direct participants only. Inherited access is resolved separately.
    pub participants: BTreeSet<UserId>,
    pub state: WorkState,
    pub progress_state: ProgressState,
    pub assigned_to: Option<UserId>,
    pub iteration_id: Option<IterationId>,
    pub created_by: Option<UserId>,
    /// `false` once the item has been deleted.
    #[serde(default = "active_default")]
    pub active: bool,
    /// Earliest day work may start.
    pub constraint_start: Option<NaiveDate>,
    /// Latest day work must finish by.
    pub constraint_finish: Option<NaiveDate>,
    /// Estimated effort in minutes.
    pub estimated_minutes: Option<u32>,
}

fn active_default() -> bool {
    true
}

impl WorkItem {
    /// Creates a root project owned by `organization_id`.
    pub fn new_project(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            WorkItemKind::Project,
            organization_id,
            None,
            name,
        )
    }

    /// Creates an item of `kind` under `parent`, in the parent's organization.
    pub fn new_child(kind: WorkItemKind, parent: &WorkItem, name: impl Into<String>) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            kind,
            parent.organization_id,
            Some(parent.id),
            name,
        )
    }

    /// Creates an item with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: WorkItemId,
        kind: WorkItemKind,
        organization_id: OrganizationId,
        parent_id: Option<WorkItemId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            parent_id,
            organization_id,
            participants: BTreeSet::new(),
            state: WorkState::Opened,
            progress_state: ProgressState::Backlog,
            assigned_to: None,
            iteration_id: None,
            created_by: None,
            active: true,
            constraint_start: None,
            constraint_finish: None,
            estimated_minutes: None,
        }
    }

    pub fn is_project(&self) -> bool {
        self.kind == WorkItemKind::Project
    }

    /// Checks single-record invariants before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_name(&self.name)?;
        match self.parent_id {
            None if !self.is_project() => return Err(ValidationError::MissingParent),
            Some(parent_id) if parent_id == self.id => return Err(ValidationError::SelfParent),
            _ => {}
        }
        if self.is_project() && self.iteration_id.is_some() {
            return Err(ValidationError::ProjectInIteration);
        }
        if let (Some(start), Some(finish)) = (self.constraint_start, self.constraint_finish) {
            if start > finish {
                return Err(ValidationError::ConstraintWindowReversed);
            }
        }
        Ok(())
    }

    /// Applies one typed change and reports whether the record changed.
    pub fn apply_change(&mut self, change: TaskChange) -> bool {
        match change {
            TaskChange::State(state) => replace_if_different(&mut self.state, state),
            TaskChange::ProgressState(progress) => {
                replace_if_different(&mut self.progress_state, progress)
            }
            TaskChange::AssignTo(user_id) => {
                replace_if_different(&mut self.assigned_to, Some(user_id))
            }
            TaskChange::ClearAssignee => replace_if_different(&mut self.assigned_to, None),
            TaskChange::ConstraintDates { start, finish } => {
                let start_changed = replace_if_different(&mut self.constraint_start, start);
                let finish_changed = replace_if_different(&mut self.constraint_finish, finish);
                start_changed || finish_changed
            }
            TaskChange::EstimatedMinutes(minutes) => {
                replace_if_different(&mut self.estimated_minutes, minutes)
            }
        }
    }
}

/// One updatable task field with its new value.
///
/// The set of legal mutations is closed: anything not listed here cannot be
/// changed through a task update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum TaskChange {
    State(WorkState),
    ProgressState(ProgressState),
    AssignTo(UserId),
    ClearAssignee,
    /// Replaces both ends of the constraint window; `None` clears an end.
    ConstraintDates {
        start: Option<NaiveDate>,
        finish: Option<NaiveDate>,
    },
    /// Sets or clears the effort estimate.
    EstimatedMinutes(Option<u32>),
}

fn replace_if_different<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::{TaskChange, WorkItem, WorkItemKind};
    use crate::model::ValidationError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn task() -> WorkItem {
        let project = WorkItem::new_project(Uuid::new_v4(), "Tracker");
        WorkItem::new_child(WorkItemKind::Task, &project, "Fix login")
    }

    #[test]
    fn constraint_dates_replace_both_ends() {
        let mut item = task();
        let start = NaiveDate::from_ymd_opt(2024, 5, 1);
        let finish = NaiveDate::from_ymd_opt(2024, 5, 3);

        assert!(item.apply_change(TaskChange::ConstraintDates { start, finish }));
        assert!(!item.apply_change(TaskChange::ConstraintDates { start, finish }));
        assert!(item.apply_change(TaskChange::ConstraintDates {
            start: None,
            finish
        }));
        assert_eq!(item.constraint_start, None);
        assert_eq!(item.constraint_finish, finish);
    }

    #[test]
    fn reversed_constraint_window_fails_validation() {
        let mut item = task();
        item.apply_change(TaskChange::ConstraintDates {
            start: NaiveDate::from_ymd_opt(2024, 5, 3),
            finish: NaiveDate::from_ymd_opt(2024, 5, 1),
        });
        assert_eq!(
            item.validate().unwrap_err(),
            ValidationError::ConstraintWindowReversed
        );

        item.constraint_finish = item.constraint_start;
        item.validate().unwrap();
    }
}

//! Append-only record of task updates.

use crate::model::actor::UserId;
use crate::model::work_item::{ProgressState, WorkItem, WorkItemId, WorkState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable history entry identifier.
pub type HistoryId = Uuid;

/// One update to a task: an optional comment plus every field that changed.
///
/// Unchanged fields keep both `previous_*` and `new_*` as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub work_item_id: WorkItemId,
    pub updated_by: Option<UserId>,
    pub comment: Option<String>,
    pub previous_state: Option<WorkState>,
    pub new_state: Option<WorkState>,
    pub previous_progress_state: Option<ProgressState>,
    pub new_progress_state: Option<ProgressState>,
    pub previous_assigned_to: Option<UserId>,
    pub new_assigned_to: Option<UserId>,
    /// Epoch milliseconds, assigned by storage.
    pub created_at: i64,
}

impl HistoryEntry {
    /// Builds an entry from a task before and after an update.
    pub fn between(
        before: &WorkItem,
        after: &WorkItem,
        updated_by: UserId,
        comment: Option<String>,
    ) -> Self {
        let (previous_state, new_state) = diff(before.state, after.state);
        let (previous_progress_state, new_progress_state) =
            diff(before.progress_state, after.progress_state);
        let (previous_assigned_to, new_assigned_to) = if before.assigned_to == after.assigned_to {
            (None, None)
        } else {
            (before.assigned_to, after.assigned_to)
        };

        Self {
            id: Uuid::new_v4(),
            work_item_id: after.id,
            updated_by: Some(updated_by),
            comment,
            previous_state,
            new_state,
            previous_progress_state,
            new_progress_state,
            previous_assigned_to,
            new_assigned_to,
            created_at: 0,
        }
    }

    /// Whether this entry records any field change besides the comment.
    pub fn has_field_changes(&self) -> bool {
        self.new_state.is_some()
            || self.new_progress_state.is_some()
            || self.previous_assigned_to != self.new_assigned_to
    }
}

fn diff<T: PartialEq + Copy>(before: T, after: T) -> (Option<T>, Option<T>) {
    if before == after {
        (None, None)
    } else {
        (Some(before), Some(after))
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryEntry;
    use crate::model::work_item::{ProgressState, TaskChange, WorkItem, WorkItemKind};
    use uuid::Uuid;

    #[test]
    fn entry_records_only_changed_fields() {
        let project = WorkItem::new_project(Uuid::new_v4(), "Tracker");
        let before = WorkItem::new_child(WorkItemKind::Task, &project, "Fix login");
        let mut after = before.clone();
        after.apply_change(TaskChange::ProgressState(ProgressState::Review));

        let entry = HistoryEntry::between(&before, &after, Uuid::new_v4(), None);
        assert_eq!(entry.previous_progress_state, Some(ProgressState::Backlog));
        assert_eq!(entry.new_progress_state, Some(ProgressState::Review));
        assert_eq!(entry.new_state, None);
        assert!(entry.has_field_changes());
    }

    #[test]
    fn comment_only_entry_has_no_field_changes() {
        let project = WorkItem::new_project(Uuid::new_v4(), "Tracker");
        let task = WorkItem::new_child(WorkItemKind::Task, &project, "Fix login");
        let entry =
            HistoryEntry::between(&task, &task, Uuid::new_v4(), Some("looking".to_string()));
        assert!(!entry.has_field_changes());
    }
}

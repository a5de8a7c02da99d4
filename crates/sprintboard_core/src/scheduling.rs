//! Iteration date-range rules.
//!
//! # Responsibility
//! - Reject iterations whose span is empty or reversed.
//! - Reject iterations that overlap a sibling iteration of the same project.
//!
//! # Invariants
//! - Spans are closed intervals of calendar days: two iterations that share
//!   one boundary day overlap.
//! - When rescheduling, the iteration being changed is excluded from the
//!   sibling set so it never conflicts with itself.
//! - Validation is read-only. Atomicity with the following write is the
//!   caller's transaction boundary (`db::begin_immediate`).

use crate::model::iteration::{Iteration, IterationId};
use crate::model::work_item::WorkItemId;
use crate::repo::tracker_store::TrackerStore;
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a candidate span was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangeReason {
    /// `start_date >= end_date`.
    EndBeforeStart,
    /// The span shares at least one day with a sibling iteration.
    Overlap,
}

/// Rejected iteration span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongDateRange {
    pub reason: DateRangeReason,
    /// Set when `reason` is `Overlap`.
    pub conflicting_id: Option<IterationId>,
}

impl WrongDateRange {
    fn end_before_start() -> Self {
        Self {
            reason: DateRangeReason::EndBeforeStart,
            conflicting_id: None,
        }
    }

    fn overlap(conflicting_id: IterationId) -> Self {
        Self {
            reason: DateRangeReason::Overlap,
            conflicting_id: Some(conflicting_id),
        }
    }
}

impl Display for WrongDateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.reason, self.conflicting_id) {
            (DateRangeReason::EndBeforeStart, _) => {
                write!(f, "wrong date range: end before start")
            }
            (DateRangeReason::Overlap, Some(id)) => {
                write!(f, "wrong date range: overlap with iteration {id}")
            }
            (DateRangeReason::Overlap, None) => write!(f, "wrong date range: overlap"),
        }
    }
}

impl Error for WrongDateRange {}

/// Errors from validating an iteration against stored siblings.
#[derive(Debug)]
pub enum ScheduleError {
    WrongDateRange(WrongDateRange),
    /// The owning project does not exist.
    ProjectNotFound(WorkItemId),
    /// The owning item exists but is not a project.
    NotAProject(WorkItemId),
    Store(RepoError),
}

impl Display for ScheduleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongDateRange(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::NotAProject(id) => write!(f, "work item is not a project: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScheduleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::WrongDateRange(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::ProjectNotFound(_) | Self::NotAProject(_) => None,
        }
    }
}

impl From<WrongDateRange> for ScheduleError {
    fn from(value: WrongDateRange) -> Self {
        Self::WrongDateRange(value)
    }
}

impl From<RepoError> for ScheduleError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Checks a candidate span against already-loaded sibling iterations.
///
/// Returns the first conflicting sibling in `siblings` order.
pub fn check_date_range(
    start_date: NaiveDate,
    end_date: NaiveDate,
    siblings: &[Iteration],
    exclude_id: Option<IterationId>,
) -> Result<(), WrongDateRange> {
    if start_date >= end_date {
        return Err(WrongDateRange::end_before_start());
    }

    let conflict = siblings
        .iter()
        .filter(|sibling| Some(sibling.id) != exclude_id)
        .find(|sibling| sibling.overlaps(start_date, end_date));

    match conflict {
        Some(sibling) => Err(WrongDateRange::overlap(sibling.id)),
        None => Ok(()),
    }
}

/// Validates a candidate iteration of `project_id`.
///
/// # Contract
/// - Ordering is checked before any storage access.
/// - `exclude_id` names the iteration being rescheduled, if any.
/// - Returns `Ok(())` when the span may be persisted.
pub fn validate_iteration<S: TrackerStore>(
    store: &S,
    project_id: WorkItemId,
    start_date: NaiveDate,
    end_date: NaiveDate,
    exclude_id: Option<IterationId>,
) -> Result<(), ScheduleError> {
    check_date_range(start_date, end_date, &[], None)
        .map_err(|err| rejected(project_id, err, 0))?;

    let project = store
        .get_work_item(project_id)?
        .ok_or(ScheduleError::ProjectNotFound(project_id))?;
    if !project.is_project() {
        return Err(ScheduleError::NotAProject(project_id));
    }

    let siblings = store.list_iterations(project_id)?;
    check_date_range(start_date, end_date, &siblings, exclude_id)
        .map_err(|err| rejected(project_id, err, siblings.len()))
}

fn rejected(project_id: WorkItemId, err: WrongDateRange, siblings: usize) -> ScheduleError {
    let reason = match err.reason {
        DateRangeReason::EndBeforeStart => "end_before_start",
        DateRangeReason::Overlap => "overlap",
    };
    debug!(
        "event=iteration_validate module=scheduling status=rejected reason={reason} project={project_id} siblings={siblings}"
    );
    ScheduleError::WrongDateRange(err)
}

#[cfg(test)]
mod tests {
    use super::{check_date_range, validate_iteration, DateRangeReason, ScheduleError};
    use crate::model::iteration::Iteration;
    use crate::model::work_item::{WorkItem, WorkItemKind};
    use crate::testing::{day, MemoryStore};
    use uuid::Uuid;

    fn store_with_project() -> (MemoryStore, WorkItem) {
        let mut store = MemoryStore::default();
        let project = WorkItem::new_project(Uuid::new_v4(), "Tracker");
        store.insert_item(project.clone());
        (store, project)
    }

    #[test]
    fn equal_start_and_end_is_rejected() {
        let err = check_date_range(day("2024-01-01"), day("2024-01-01"), &[], None).unwrap_err();
        assert_eq!(err.reason, DateRangeReason::EndBeforeStart);
        assert_eq!(err.conflicting_id, None);
    }

    #[test]
    fn reversed_span_is_rejected_before_storage_lookup() {
        let store = MemoryStore::default();
        let err = validate_iteration(
            &store,
            Uuid::new_v4(),
            day("2024-02-10"),
            day("2024-02-01"),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::WrongDateRange(range) if range.reason == DateRangeReason::EndBeforeStart
        ));
        assert_eq!(store.item_reads(), 0);
    }

    #[test]
    fn shared_boundary_day_is_an_overlap() {
        let (mut store, project) = store_with_project();
        let first = Iteration::new(project.id, "S1", day("2024-01-01"), day("2024-01-10"));
        store.insert_iteration(first.clone());

        let err = validate_iteration(&store, project.id, day("2024-01-10"), day("2024-01-20"), None)
            .unwrap_err();
        match err {
            ScheduleError::WrongDateRange(range) => {
                assert_eq!(range.reason, DateRangeReason::Overlap);
                assert_eq!(range.conflicting_id, Some(first.id));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn adjacent_day_is_accepted() {
        let (mut store, project) = store_with_project();
        store.insert_iteration(Iteration::new(
            project.id,
            "S1",
            day("2024-01-01"),
            day("2024-01-10"),
        ));

        validate_iteration(&store, project.id, day("2024-01-11"), day("2024-01-20"), None)
            .unwrap();
    }

    #[test]
    fn containment_in_either_direction_is_an_overlap() {
        let (mut store, project) = store_with_project();
        store.insert_iteration(Iteration::new(
            project.id,
            "S1",
            day("2024-03-05"),
            day("2024-03-10"),
        ));

        assert!(
            validate_iteration(&store, project.id, day("2024-03-01"), day("2024-03-31"), None)
                .is_err()
        );
        assert!(
            validate_iteration(&store, project.id, day("2024-03-06"), day("2024-03-08"), None)
                .is_err()
        );
    }

    #[test]
    fn excluded_iteration_does_not_conflict_with_itself() {
        let (mut store, project) = store_with_project();
        let sprint = Iteration::new(project.id, "S1", day("2024-01-01"), day("2024-01-10"));
        store.insert_iteration(sprint.clone());

        validate_iteration(
            &store,
            project.id,
            sprint.start_date,
            sprint.end_date,
            Some(sprint.id),
        )
        .unwrap();
        assert!(
            validate_iteration(&store, project.id, sprint.start_date, sprint.end_date, None)
                .is_err()
        );
    }

    #[test]
    fn iterations_of_other_projects_are_ignored() {
        let (mut store, project) = store_with_project();
        let other = WorkItem::new_project(project.organization_id, "Other");
        store.insert_item(other.clone());
        store.insert_iteration(Iteration::new(
            other.id,
            "O1",
            day("2024-01-01"),
            day("2024-01-31"),
        ));

        validate_iteration(&store, project.id, day("2024-01-05"), day("2024-01-15"), None)
            .unwrap();
    }

    #[test]
    fn owner_must_be_an_existing_project() {
        let (mut store, project) = store_with_project();
        let task = WorkItem::new_child(WorkItemKind::Task, &project, "Task");
        store.insert_item(task.clone());

        let missing = Uuid::new_v4();
        assert!(matches!(
            validate_iteration(&store, missing, day("2024-01-01"), day("2024-01-02"), None),
            Err(ScheduleError::ProjectNotFound(id)) if id == missing
        ));
        assert!(matches!(
            validate_iteration(&store, task.id, day("2024-01-01"), day("2024-01-02"), None),
            Err(ScheduleError::NotAProject(id)) if id == task.id
        ));
    }
}

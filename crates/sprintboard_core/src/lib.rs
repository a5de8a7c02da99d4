//! Core domain logic for SprintBoard.
//! This crate is the single source of truth for scheduling and access invariants.

pub mod access;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scheduling;
pub mod service;

#[cfg(test)]
mod testing;

pub use access::{
    is_org_admin, resolve_participants, HierarchyFault, ParticipantError, ParticipantResolver,
    MAX_HIERARCHY_DEPTH,
};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::actor::{Actor, UserId};
pub use model::history::{HistoryEntry, HistoryId};
pub use model::iteration::{Iteration, IterationId};
pub use model::organization::{Organization, OrganizationId, User};
pub use model::tag::{Tag, TagId, DEFAULT_TAG_COLOR};
pub use model::timesheet::{TimesheetLine, TimesheetLineId};
pub use model::work_item::{
    ProgressState, TaskChange, WorkItem, WorkItemId, WorkItemKind, WorkState,
};
pub use model::ValidationError;
pub use repo::iteration_repo::{IterationRepository, SqliteIterationRepository};
pub use repo::org_repo::{OrgRepository, SqliteOrgRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagRepository};
pub use repo::timesheet_repo::{SqliteTimesheetRepository, TimesheetRepository};
pub use repo::tracker_store::{SqliteTrackerStore, TrackerStore};
pub use repo::work_item_repo::{SqliteWorkItemRepository, WorkItemRepository};
pub use repo::{RepoError, RepoResult};
pub use scheduling::{
    check_date_range, validate_iteration, DateRangeReason, ScheduleError, WrongDateRange,
};
pub use service::iteration_service::{IterationChange, IterationService, NewIteration};
pub use service::tag_service::TagService;
pub use service::work_item_service::{TaskUpdate, WorkItemService};
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

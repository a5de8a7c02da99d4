//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce record `validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Repositories never open transactions; services own the boundary.

pub mod iteration_repo;
pub mod org_repo;
pub mod tag_repo;
pub mod timesheet_repo;
pub mod tracker_store;
pub mod work_item_repo;

use crate::db::DbError;
use crate::model::work_item::{ProgressState, WorkItemKind, WorkState};
use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for tracker persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted tracker data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn kind_to_db(kind: WorkItemKind) -> &'static str {
    match kind {
        WorkItemKind::Project => "project",
        WorkItemKind::Task => "task",
        WorkItemKind::Story => "story",
    }
}

pub(crate) fn parse_kind(value: &str) -> Option<WorkItemKind> {
    match value {
        "project" => Some(WorkItemKind::Project),
        "task" => Some(WorkItemKind::Task),
        "story" => Some(WorkItemKind::Story),
        _ => None,
    }
}

pub(crate) fn state_to_db(state: WorkState) -> &'static str {
    match state {
        WorkState::Opened => "opened",
        WorkState::Done => "done",
    }
}

pub(crate) fn parse_state(value: &str) -> Option<WorkState> {
    match value {
        "opened" => Some(WorkState::Opened),
        "done" => Some(WorkState::Done),
        _ => None,
    }
}

pub(crate) fn progress_to_db(progress: ProgressState) -> &'static str {
    match progress {
        ProgressState::Backlog => "backlog",
        ProgressState::Planning => "planning",
        ProgressState::InProgress => "in_progress",
        ProgressState::Review => "review",
    }
}

pub(crate) fn parse_progress(value: &str) -> Option<ProgressState> {
    match value {
        "backlog" => Some(ProgressState::Backlog),
        "planning" => Some(ProgressState::Planning),
        "in_progress" => Some(ProgressState::InProgress),
        "review" => Some(ProgressState::Review),
        _ => None,
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|value| parse_uuid(&value, column)).transpose()
}

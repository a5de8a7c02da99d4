//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce access rules for an explicit acting user on every call.
//! - Own the transaction boundary of multi-statement writes.
//!
//! # Invariants
//! - Every operation takes an `Actor`; there is no ambient current user.
//! - Writes that depend on a prior read run inside `db::begin_immediate`.

pub mod iteration_service;
pub mod tag_service;
pub mod work_item_service;

use crate::access::{is_org_admin, ParticipantError, ParticipantResolver};
use crate::db::DbError;
use crate::model::actor::{Actor, UserId};
use crate::model::history::HistoryId;
use crate::model::iteration::IterationId;
use crate::model::organization::OrganizationId;
use crate::model::tag::TagId;
use crate::model::work_item::{WorkItem, WorkItemId, WorkItemKind};
use crate::model::ValidationError;
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::tracker_store::SqliteTrackerStore;
use crate::repo::RepoError;
use crate::scheduling::ScheduleError;
use log::warn;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from tracker use-case services.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed single-record validation.
    Invalid(ValidationError),
    /// Target record does not exist.
    NotFound { entity: &'static str, id: Uuid },
    /// Actor is not an effective participant of the item.
    AccessDenied { user_id: UserId, item_id: WorkItemId },
    /// Operation is reserved for organization admins.
    AdminRequired(UserId),
    /// Item exists but has the wrong kind for this operation.
    WrongKind {
        id: WorkItemId,
        expected: &'static str,
    },
    /// User belongs to a different organization than the item.
    ForeignUser {
        user_id: UserId,
        organization_id: OrganizationId,
    },
    /// Only the author of a history entry or an admin may edit its comment.
    NotHistoryAuthor {
        user_id: UserId,
        history_id: HistoryId,
    },
    /// User is already a direct participant.
    AlreadyParticipant { item_id: WorkItemId, user_id: UserId },
    /// A tag with this name already exists in the project.
    DuplicateTag { project_id: WorkItemId, name: String },
    /// Tag belongs to a different project than the task.
    TagProjectMismatch { tag_id: TagId, task_id: WorkItemId },
    /// Item is not a direct child of the iteration's project.
    IterationProjectMismatch {
        iteration_id: IterationId,
        item_id: WorkItemId,
    },
    /// Iteration span rejected.
    Schedule(ScheduleError),
    /// Participant resolution failed on a corrupt hierarchy.
    Participants(ParticipantError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::AccessDenied { user_id, item_id } => {
                write!(f, "user {user_id} may not access work item {item_id}")
            }
            Self::AdminRequired(user_id) => {
                write!(f, "user {user_id} is not an organization admin")
            }
            Self::WrongKind { id, expected } => write!(f, "work item {id} is not a {expected}"),
            Self::ForeignUser {
                user_id,
                organization_id,
            } => write!(
                f,
                "user {user_id} does not belong to organization {organization_id}"
            ),
            Self::NotHistoryAuthor {
                user_id,
                history_id,
            } => write!(f, "user {user_id} did not write history entry {history_id}"),
            Self::AlreadyParticipant { item_id, user_id } => {
                write!(f, "user {user_id} already participates in {item_id}")
            }
            Self::DuplicateTag { project_id, name } => {
                write!(f, "tag `{name}` already exists in project {project_id}")
            }
            Self::TagProjectMismatch { tag_id, task_id } => {
                write!(f, "tag {tag_id} does not belong to the project of task {task_id}")
            }
            Self::IterationProjectMismatch {
                iteration_id,
                item_id,
            } => write!(
                f,
                "work item {item_id} is not in the project of iteration {iteration_id}"
            ),
            Self::Schedule(err) => write!(f, "{err}"),
            Self::Participants(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Schedule(err) => Some(err),
            Self::Participants(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Invalid(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

impl From<ScheduleError> for ServiceError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::ProjectNotFound(id) => Self::NotFound {
                entity: "project",
                id,
            },
            ScheduleError::NotAProject(id) => Self::WrongKind {
                id,
                expected: "project",
            },
            ScheduleError::Store(err) => err.into(),
            other => Self::Schedule(other),
        }
    }
}

impl From<ParticipantError> for ServiceError {
    fn from(value: ParticipantError) -> Self {
        match value {
            ParticipantError::NotFound(id) => Self::NotFound {
                entity: "work item",
                id,
            },
            ParticipantError::Store(err) => err.into(),
            other => Self::Participants(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Loads an item and checks that the actor is one of its effective
/// participants.
pub(crate) fn require_access(
    conn: &Connection,
    actor: &Actor,
    item_id: WorkItemId,
) -> ServiceResult<WorkItem> {
    let store = SqliteTrackerStore::new(conn);
    let mut resolver = ParticipantResolver::new(&store);
    if !resolver.can_access(actor, item_id)? {
        warn!(
            "event=access_check module=service status=denied user={} item={}",
            actor.user_id, item_id
        );
        return Err(ServiceError::AccessDenied {
            user_id: actor.user_id,
            item_id,
        });
    }
    load_required_item(conn, item_id)
}

/// Checks that the actor administers their organization.
pub(crate) fn require_org_admin(conn: &Connection, actor: &Actor) -> ServiceResult<()> {
    let store = SqliteTrackerStore::new(conn);
    if !is_org_admin(&store, actor)? {
        warn!(
            "event=admin_check module=service status=denied user={}",
            actor.user_id
        );
        return Err(ServiceError::AdminRequired(actor.user_id));
    }
    Ok(())
}

/// Checks that `user_id` exists and belongs to `organization_id`.
pub(crate) fn require_member(
    conn: &Connection,
    user_id: UserId,
    organization_id: OrganizationId,
) -> ServiceResult<()> {
    let user = SqliteOrgRepository::new(conn)
        .get_user(user_id)?
        .ok_or(ServiceError::NotFound {
            entity: "user",
            id: user_id,
        })?;
    if user.organization_id != organization_id {
        return Err(ServiceError::ForeignUser {
            user_id,
            organization_id,
        });
    }
    Ok(())
}

/// Loads an item that has not been deleted.
pub(crate) fn load_required_item(
    conn: &Connection,
    item_id: WorkItemId,
) -> ServiceResult<WorkItem> {
    crate::repo::work_item_repo::load_work_item(conn, item_id)?
        .filter(|item| item.active)
        .ok_or(ServiceError::NotFound {
            entity: "work item",
            id: item_id,
        })
}

pub(crate) fn require_kind(item: &WorkItem, kind: WorkItemKind) -> ServiceResult<()> {
    if item.kind != kind {
        return Err(ServiceError::WrongKind {
            id: item.id,
            expected: kind_label(kind),
        });
    }
    Ok(())
}

/// Checks that `project_id` is a project of the actor's organization.
pub(crate) fn require_own_project(
    conn: &Connection,
    actor: &Actor,
    project_id: WorkItemId,
) -> ServiceResult<WorkItem> {
    let project = load_required_item(conn, project_id)?;
    require_kind(&project, WorkItemKind::Project)?;
    if project.organization_id != actor.organization_id {
        return Err(ServiceError::AccessDenied {
            user_id: actor.user_id,
            item_id: project_id,
        });
    }
    Ok(project)
}

fn kind_label(kind: WorkItemKind) -> &'static str {
    match kind {
        WorkItemKind::Project => "project",
        WorkItemKind::Task => "task",
        WorkItemKind::Story => "story",
    }
}

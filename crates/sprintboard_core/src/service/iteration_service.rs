//! Iteration use-case service.
//!
//! # Responsibility
//! - Create, reschedule and delete project iterations.
//! - Schedule tasks and stories into iterations.
//!
//! # Invariants
//! - Create and reschedule validate the span and write it inside one
//!   IMMEDIATE transaction, so concurrent writers cannot both pass the
//!   overlap check against the same snapshot.
//! - Only effective participants of the project may change its iterations.
//! - Scheduled items are direct, non-project children of the project.

use crate::db::begin_immediate;
use crate::model::actor::Actor;
use crate::model::iteration::{Iteration, IterationId};
use crate::model::normalize_name;
use crate::model::work_item::{WorkItem, WorkItemId, WorkItemKind};
use crate::repo::iteration_repo::{IterationRepository, SqliteIterationRepository};
use crate::repo::tracker_store::SqliteTrackerStore;
use crate::repo::work_item_repo::{SqliteWorkItemRepository, WorkItemRepository};
use crate::scheduling::validate_iteration;
use crate::service::{require_access, require_kind, ServiceError, ServiceResult};
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;

/// Request model for creating an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIteration {
    pub project_id: WorkItemId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One updatable iteration field with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationChange {
    Rename(String),
    Reschedule {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

/// Iteration service facade over one SQLite connection.
pub struct IterationService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> IterationService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates an iteration after validating its span against siblings.
    pub fn create_iteration(
        &self,
        actor: &Actor,
        request: &NewIteration,
    ) -> ServiceResult<Iteration> {
        let name = normalize_name(&request.name)?;

        let tx = begin_immediate(self.conn)?;
        let project = require_access(&tx, actor, request.project_id)?;
        require_kind(&project, WorkItemKind::Project)?;

        validate_iteration(
            &SqliteTrackerStore::new(&tx),
            project.id,
            request.start_date,
            request.end_date,
            None,
        )?;

        let iteration = Iteration::new(project.id, name, request.start_date, request.end_date);
        SqliteIterationRepository::new(&tx).insert_iteration(&iteration)?;
        tx.commit()?;

        info!(
            "event=iteration_create module=iteration status=ok iteration={} project={} days={}",
            iteration.id,
            project.id,
            iteration.length_days()
        );
        Ok(iteration)
    }

    /// Applies typed changes to an existing iteration.
    ///
    /// A reschedule is validated with the iteration itself excluded from the
    /// sibling set.
    pub fn update_iteration(
        &self,
        actor: &Actor,
        iteration_id: IterationId,
        changes: &[IterationChange],
    ) -> ServiceResult<Iteration> {
        let tx = begin_immediate(self.conn)?;
        let repo = SqliteIterationRepository::new(&tx);
        let mut iteration = load_required_iteration(&repo, iteration_id)?;
        require_access(&tx, actor, iteration.project_id)?;

        let mut rescheduled = false;
        for change in changes {
            match change {
                IterationChange::Rename(name) => iteration.name = normalize_name(name)?,
                IterationChange::Reschedule {
                    start_date,
                    end_date,
                } => {
                    iteration.start_date = *start_date;
                    iteration.end_date = *end_date;
                    rescheduled = true;
                }
            }
        }

        if rescheduled {
            validate_iteration(
                &SqliteTrackerStore::new(&tx),
                iteration.project_id,
                iteration.start_date,
                iteration.end_date,
                Some(iteration.id),
            )?;
        }

        repo.update_iteration(&iteration)?;
        tx.commit()?;

        info!(
            "event=iteration_update module=iteration status=ok iteration={} rescheduled={}",
            iteration.id, rescheduled
        );
        Ok(iteration)
    }

    /// Deletes an iteration. Its items stay in the project, unscheduled.
    pub fn delete_iteration(&self, actor: &Actor, iteration_id: IterationId) -> ServiceResult<()> {
        let tx = begin_immediate(self.conn)?;
        let repo = SqliteIterationRepository::new(&tx);
        let iteration = load_required_iteration(&repo, iteration_id)?;
        require_access(&tx, actor, iteration.project_id)?;
        repo.delete_iteration(iteration.id)?;
        tx.commit()?;

        info!(
            "event=iteration_delete module=iteration status=ok iteration={} project={}",
            iteration.id, iteration.project_id
        );
        Ok(())
    }

    pub fn get_iteration(
        &self,
        actor: &Actor,
        iteration_id: IterationId,
    ) -> ServiceResult<Iteration> {
        let repo = SqliteIterationRepository::new(self.conn);
        let iteration = load_required_iteration(&repo, iteration_id)?;
        require_access(self.conn, actor, iteration.project_id)?;
        Ok(iteration)
    }

    /// Lists a project's iterations ordered by start date.
    pub fn list_iterations(
        &self,
        actor: &Actor,
        project_id: WorkItemId,
    ) -> ServiceResult<Vec<Iteration>> {
        let project = require_access(self.conn, actor, project_id)?;
        require_kind(&project, WorkItemKind::Project)?;
        Ok(SqliteIterationRepository::new(self.conn).list_iterations(project.id)?)
    }

    /// Returns the iteration of `project_id` that covers `day`, if any.
    pub fn iteration_on(
        &self,
        actor: &Actor,
        project_id: WorkItemId,
        day: NaiveDate,
    ) -> ServiceResult<Option<Iteration>> {
        Ok(self
            .list_iterations(actor, project_id)?
            .into_iter()
            .find(|iteration| iteration.contains(day)))
    }

    /// Schedules a task or story of the iteration's project into it.
    pub fn schedule_item(
        &self,
        actor: &Actor,
        iteration_id: IterationId,
        item_id: WorkItemId,
    ) -> ServiceResult<WorkItem> {
        let tx = begin_immediate(self.conn)?;
        let iteration =
            load_required_iteration(&SqliteIterationRepository::new(&tx), iteration_id)?;
        let mut item = require_access(&tx, actor, item_id)?;
        if item.is_project() || item.parent_id != Some(iteration.project_id) {
            return Err(ServiceError::IterationProjectMismatch {
                iteration_id,
                item_id,
            });
        }

        item.iteration_id = Some(iteration.id);
        SqliteWorkItemRepository::new(&tx).update_work_item(&item)?;
        tx.commit()?;

        info!(
            "event=iteration_schedule module=iteration status=ok iteration={} item={}",
            iteration.id, item.id
        );
        Ok(item)
    }

    /// Removes an item from whatever iteration it is scheduled in.
    pub fn unschedule_item(&self, actor: &Actor, item_id: WorkItemId) -> ServiceResult<WorkItem> {
        let tx = begin_immediate(self.conn)?;
        let mut item = require_access(&tx, actor, item_id)?;
        if item.iteration_id.take().is_some() {
            SqliteWorkItemRepository::new(&tx).update_work_item(&item)?;
        }
        tx.commit()?;
        Ok(item)
    }

    pub fn list_iteration_items(
        &self,
        actor: &Actor,
        iteration_id: IterationId,
    ) -> ServiceResult<Vec<WorkItem>> {
        let repo = SqliteIterationRepository::new(self.conn);
        let iteration = load_required_iteration(&repo, iteration_id)?;
        require_access(self.conn, actor, iteration.project_id)?;
        Ok(repo.list_items(iteration.id)?)
    }
}

fn load_required_iteration(
    repo: &impl IterationRepository,
    iteration_id: IterationId,
) -> ServiceResult<Iteration> {
    repo.get_iteration(iteration_id)?.ok_or(ServiceError::NotFound {
        entity: "iteration",
        id: iteration_id,
    })
}

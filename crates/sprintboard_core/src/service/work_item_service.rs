//! Work item use-case service.
//!
//! # Responsibility
//! - Create projects, tasks and stories in the work tree.
//! - Apply typed task updates and record them in history.
//! - Manage direct participants (watch, invite, remove).
//! - Delete tasks, edit history comments and log time.
//!
//! # Invariants
//! - Only organization admins create projects and manage project members.
//! - The creator of a task or story becomes a direct participant.
//! - A task update writes the task, its history entry and any new
//!   participants in one transaction.
//! - Assignees and notified users must belong to the item's organization.
//! - Deleted items stay stored but behave as missing for every operation.
//! - A history comment may be edited only by its author or an org admin.

use crate::access::{is_org_admin, ParticipantResolver};
use crate::db::begin_immediate;
use crate::model::actor::{Actor, UserId};
use crate::model::history::{HistoryEntry, HistoryId};
use crate::model::timesheet::TimesheetLine;
use crate::model::work_item::{TaskChange, WorkItem, WorkItemId, WorkItemKind};
use crate::model::normalize_name;
use crate::repo::timesheet_repo::{SqliteTimesheetRepository, TimesheetRepository};
use crate::repo::tracker_store::SqliteTrackerStore;
use crate::repo::work_item_repo::{SqliteWorkItemRepository, WorkItemRepository};
use crate::service::{
    load_required_item, require_access, require_member, require_org_admin,
    require_own_project, ServiceError, ServiceResult,
};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;

/// Request model for one task update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    /// Free-text comment stored with the history entry.
    pub comment: Option<String>,
    /// Field changes, applied in order.
    pub changes: Vec<TaskChange>,
    /// Extra users to add as direct participants.
    pub notify: Vec<UserId>,
}

/// Work item service facade over one SQLite connection.
pub struct WorkItemService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> WorkItemService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates a project in the actor's organization, optionally nested
    /// under another project.
    pub fn create_project(
        &self,
        actor: &Actor,
        name: &str,
        parent_id: Option<WorkItemId>,
    ) -> ServiceResult<WorkItem> {
        let name = normalize_name(name)?;
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;

        let mut project = match parent_id {
            Some(parent_id) => {
                let parent = require_own_project(&tx, actor, parent_id)?;
                WorkItem::new_child(WorkItemKind::Project, &parent, name)
            }
            None => WorkItem::new_project(actor.organization_id, name),
        };
        project.created_by = Some(actor.user_id);

        SqliteWorkItemRepository::new(&tx).create_work_item(&project)?;
        tx.commit()?;

        info!(
            "event=project_create module=work_item status=ok project={} nested={}",
            project.id,
            parent_id.is_some()
        );
        Ok(project)
    }

    /// Creates an item of `kind` under `parent_id`.
    ///
    /// Sub-projects go through `create_project` and its admin check.
    pub fn create_child(
        &self,
        actor: &Actor,
        parent_id: WorkItemId,
        kind: WorkItemKind,
        name: &str,
    ) -> ServiceResult<WorkItem> {
        if kind == WorkItemKind::Project {
            return self.create_project(actor, name, Some(parent_id));
        }
        let name = normalize_name(name)?;

        let tx = begin_immediate(self.conn)?;
        let parent = require_access(&tx, actor, parent_id)?;

        let mut item = WorkItem::new_child(kind, &parent, name);
        item.created_by = Some(actor.user_id);
        item.participants.insert(actor.user_id);

        SqliteWorkItemRepository::new(&tx).create_work_item(&item)?;
        tx.commit()?;

        info!(
            "event=work_item_create module=work_item status=ok item={} parent={}",
            item.id, parent.id
        );
        Ok(item)
    }

    pub fn create_task(
        &self,
        actor: &Actor,
        parent_id: WorkItemId,
        name: &str,
    ) -> ServiceResult<WorkItem> {
        self.create_child(actor, parent_id, WorkItemKind::Task, name)
    }

    pub fn get_item(&self, actor: &Actor, item_id: WorkItemId) -> ServiceResult<WorkItem> {
        require_access(self.conn, actor, item_id)
    }

    pub fn list_children(
        &self,
        actor: &Actor,
        parent_id: WorkItemId,
        kind: Option<WorkItemKind>,
    ) -> ServiceResult<Vec<WorkItem>> {
        let parent = require_access(self.conn, actor, parent_id)?;
        Ok(SqliteWorkItemRepository::new(self.conn).list_children(parent.id, kind)?)
    }

    /// Lists root projects visible to the actor.
    ///
    /// Admins see every root project of their organization; other users see
    /// the ones they participate in.
    pub fn list_projects(&self, actor: &Actor) -> ServiceResult<Vec<WorkItem>> {
        let store = SqliteTrackerStore::new(self.conn);
        let projects =
            SqliteWorkItemRepository::new(self.conn).list_root_projects(actor.organization_id)?;
        if is_org_admin(&store, actor)? {
            return Ok(projects);
        }

        let mut resolver = ParticipantResolver::new(&store);
        let mut visible = Vec::new();
        for project in projects {
            if resolver.can_access(actor, project.id)? {
                visible.push(project);
            }
        }
        Ok(visible)
    }

    /// Applies a typed update to a task or story and records history.
    ///
    /// The history entry is written even when only a comment is given.
    pub fn update_task(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        update: &TaskUpdate,
    ) -> ServiceResult<HistoryEntry> {
        let tx = begin_immediate(self.conn)?;
        let before = require_access(&tx, actor, task_id)?;
        require_not_project(&before)?;

        let mut after = before.clone();
        let mut new_participants = Vec::new();
        for change in &update.changes {
            if let TaskChange::AssignTo(user_id) = change {
                require_member(&tx, *user_id, after.organization_id)?;
                new_participants.push(*user_id);
            }
            after.apply_change(*change);
        }
        for user_id in &update.notify {
            require_member(&tx, *user_id, after.organization_id)?;
            new_participants.push(*user_id);
        }
        new_participants.push(actor.user_id);
        new_participants.retain(|user_id| !before.participants.contains(user_id));

        let repo = SqliteWorkItemRepository::new(&tx);
        if after != before {
            repo.update_work_item(&after)?;
        }
        let comment = update.comment.as_deref().and_then(clean_comment);
        let entry = HistoryEntry::between(&before, &after, actor.user_id, comment);
        repo.append_history(&entry)?;
        let added = repo.add_participants(task_id, &new_participants)?;
        tx.commit()?;

        info!(
            "event=task_update module=work_item status=ok item={} field_changes={} participants_added={}",
            task_id,
            entry.has_field_changes(),
            added
        );
        Ok(entry)
    }

    /// Adds the actor as a direct participant. Returns `false` if already one.
    pub fn watch(&self, actor: &Actor, item_id: WorkItemId) -> ServiceResult<bool> {
        let item = require_access(self.conn, actor, item_id)?;
        let added =
            SqliteWorkItemRepository::new(self.conn).add_participants(item.id, &[actor.user_id])?;
        Ok(added == 1)
    }

    /// Removes the actor from the direct participants.
    ///
    /// Inherited access through ancestors or admin status is unaffected.
    pub fn unwatch(&self, actor: &Actor, item_id: WorkItemId) -> ServiceResult<bool> {
        let item = require_access(self.conn, actor, item_id)?;
        Ok(SqliteWorkItemRepository::new(self.conn).remove_participant(item.id, actor.user_id)?)
    }

    /// Adds an organization member to a project's direct participants.
    pub fn add_participant(
        &self,
        actor: &Actor,
        project_id: WorkItemId,
        user_id: UserId,
    ) -> ServiceResult<()> {
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;
        let project = require_own_project(&tx, actor, project_id)?;
        require_member(&tx, user_id, project.organization_id)?;
        if project.participants.contains(&user_id) {
            return Err(ServiceError::AlreadyParticipant {
                item_id: project_id,
                user_id,
            });
        }

        SqliteWorkItemRepository::new(&tx).add_participants(project.id, &[user_id])?;
        tx.commit()?;

        info!(
            "event=participant_add module=work_item status=ok project={} user={}",
            project.id, user_id
        );
        Ok(())
    }

    /// Removes a user from a project and its direct children, clearing
    /// their assignment on those items first.
    pub fn remove_participant(
        &self,
        actor: &Actor,
        project_id: WorkItemId,
        user_id: UserId,
    ) -> ServiceResult<()> {
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;
        let project = require_own_project(&tx, actor, project_id)?;

        let repo = SqliteWorkItemRepository::new(&tx);
        let mut affected = vec![project.id];
        affected.extend(repo.list_children(project.id, None)?.into_iter().map(|item| item.id));

        let unassigned = repo.clear_assignments(&affected, user_id)?;
        for item_id in &affected {
            repo.remove_participant(*item_id, user_id)?;
        }
        tx.commit()?;

        info!(
            "event=participant_remove module=work_item status=ok project={} user={} unassigned={}",
            project.id, user_id, unassigned
        );
        Ok(())
    }

    /// Lists the history of a task, oldest first.
    pub fn list_history(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        let task = require_access(self.conn, actor, task_id)?;
        require_not_project(&task)?;
        Ok(SqliteWorkItemRepository::new(self.conn).list_history(task.id)?)
    }

    /// Deletes a task or story. Admin only.
    ///
    /// The row is kept as inactive; later lookups report it as not found.
    pub fn delete_task(&self, actor: &Actor, task_id: WorkItemId) -> ServiceResult<()> {
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;
        let task = load_required_item(&tx, task_id)?;
        require_not_project(&task)?;
        if task.organization_id != actor.organization_id {
            return Err(ServiceError::AccessDenied {
                user_id: actor.user_id,
                item_id: task_id,
            });
        }

        SqliteWorkItemRepository::new(&tx).deactivate_work_item(task.id)?;
        tx.commit()?;

        info!("event=task_delete module=work_item status=ok item={}", task.id);
        Ok(())
    }

    /// Replaces the comment of one history entry of `task_id`.
    ///
    /// A blank comment clears it.
    pub fn update_comment(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        history_id: HistoryId,
        comment: &str,
    ) -> ServiceResult<HistoryEntry> {
        let tx = begin_immediate(self.conn)?;
        let task = require_access(&tx, actor, task_id)?;
        require_not_project(&task)?;

        let repo = SqliteWorkItemRepository::new(&tx);
        let mut entry = repo
            .get_history_entry(history_id)?
            .filter(|entry| entry.work_item_id == task.id)
            .ok_or(ServiceError::NotFound {
                entity: "history entry",
                id: history_id,
            })?;
        if entry.updated_by != Some(actor.user_id)
            && !is_org_admin(&SqliteTrackerStore::new(&tx), actor)?
        {
            warn!(
                "event=history_comment module=work_item status=denied user={} entry={}",
                actor.user_id, history_id
            );
            return Err(ServiceError::NotHistoryAuthor {
                user_id: actor.user_id,
                history_id,
            });
        }

        entry.comment = clean_comment(comment);
        repo.update_history_comment(entry.id, entry.comment.as_deref())?;
        tx.commit()?;

        info!(
            "event=history_comment module=work_item status=ok item={} entry={}",
            task.id, entry.id
        );
        Ok(entry)
    }

    /// Logs `minutes` of the actor's time on a task or story.
    pub fn log_time(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        minutes: u32,
        work_date: NaiveDate,
    ) -> ServiceResult<TimesheetLine> {
        let line = TimesheetLine::new(task_id, actor.user_id, minutes, work_date);
        line.validate()?;

        let tx = begin_immediate(self.conn)?;
        let task = require_access(&tx, actor, task_id)?;
        require_not_project(&task)?;
        SqliteTimesheetRepository::new(&tx).create_line(&line)?;
        tx.commit()?;

        info!(
            "event=time_log module=work_item status=ok item={} minutes={}",
            task.id, line.minutes
        );
        Ok(line)
    }

    /// Lists time logged on a task, by work date.
    pub fn list_time(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
    ) -> ServiceResult<Vec<TimesheetLine>> {
        let task = require_access(self.conn, actor, task_id)?;
        require_not_project(&task)?;
        Ok(SqliteTimesheetRepository::new(self.conn).list_lines(task.id)?)
    }

    /// Total minutes logged on a task by everyone.
    pub fn logged_minutes(&self, actor: &Actor, task_id: WorkItemId) -> ServiceResult<u64> {
        let task = require_access(self.conn, actor, task_id)?;
        require_not_project(&task)?;
        Ok(SqliteTimesheetRepository::new(self.conn).total_minutes(task.id)?)
    }
}

fn clean_comment(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn require_not_project(item: &WorkItem) -> ServiceResult<()> {
    if item.is_project() {
        return Err(ServiceError::WrongKind {
            id: item.id,
            expected: "task or story",
        });
    }
    Ok(())
}

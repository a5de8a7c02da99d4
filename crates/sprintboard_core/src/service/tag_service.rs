//! Tag use-case service.
//!
//! # Invariants
//! - Only organization admins create or delete tags.
//! - Tag names are unique per project.
//! - Tags attach only to tasks that are direct children of the tag's project.

use crate::db::begin_immediate;
use crate::model::actor::Actor;
use crate::model::normalize_name;
use crate::model::tag::{Tag, TagId};
use crate::model::work_item::{WorkItem, WorkItemId, WorkItemKind};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use crate::service::{
    require_access, require_kind, require_org_admin, require_own_project, ServiceError,
    ServiceResult,
};
use log::info;
use rusqlite::Connection;

/// Tag service facade over one SQLite connection.
pub struct TagService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TagService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates a tag in a project. `color` defaults to `#999`.
    pub fn create_tag(
        &self,
        actor: &Actor,
        project_id: WorkItemId,
        name: &str,
        color: Option<String>,
    ) -> ServiceResult<Tag> {
        let name = normalize_name(name)?;
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;
        let project = require_own_project(&tx, actor, project_id)?;

        let repo = SqliteTagRepository::new(&tx);
        if repo.find_tag_by_name(project.id, &name)?.is_some() {
            return Err(ServiceError::DuplicateTag {
                project_id: project.id,
                name,
            });
        }

        let tag = Tag::new(project.id, name, color);
        repo.create_tag(&tag)?;
        tx.commit()?;

        info!(
            "event=tag_create module=tag status=ok tag={} project={}",
            tag.id, project.id
        );
        Ok(tag)
    }

    pub fn delete_tag(&self, actor: &Actor, tag_id: TagId) -> ServiceResult<()> {
        let tx = begin_immediate(self.conn)?;
        require_org_admin(&tx, actor)?;
        let repo = SqliteTagRepository::new(&tx);
        let tag = load_required_tag(&repo, tag_id)?;
        require_own_project(&tx, actor, tag.project_id)?;
        repo.delete_tag(tag.id)?;
        tx.commit()?;

        info!("event=tag_delete module=tag status=ok tag={}", tag.id);
        Ok(())
    }

    pub fn list_tags(&self, actor: &Actor, project_id: WorkItemId) -> ServiceResult<Vec<Tag>> {
        let project = require_access(self.conn, actor, project_id)?;
        require_kind(&project, WorkItemKind::Project)?;
        Ok(SqliteTagRepository::new(self.conn).list_tags(project.id)?)
    }

    /// Attaches a tag to a task. Returns `false` if already attached.
    pub fn add_tag(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        tag_id: TagId,
    ) -> ServiceResult<bool> {
        let (task, tag) = self.load_task_and_tag(actor, task_id, tag_id)?;
        Ok(SqliteTagRepository::new(self.conn).attach_tag(task.id, tag.id)?)
    }

    /// Detaches a tag from a task. Returns `false` if it was not attached.
    pub fn remove_tag(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        tag_id: TagId,
    ) -> ServiceResult<bool> {
        let (task, tag) = self.load_task_and_tag(actor, task_id, tag_id)?;
        Ok(SqliteTagRepository::new(self.conn).detach_tag(task.id, tag.id)?)
    }

    pub fn list_task_tags(&self, actor: &Actor, task_id: WorkItemId) -> ServiceResult<Vec<Tag>> {
        let task = require_access(self.conn, actor, task_id)?;
        require_kind(&task, WorkItemKind::Task)?;
        Ok(SqliteTagRepository::new(self.conn).list_task_tags(task.id)?)
    }

    pub fn list_tasks_by_tag(&self, actor: &Actor, tag_id: TagId) -> ServiceResult<Vec<WorkItem>> {
        let repo = SqliteTagRepository::new(self.conn);
        let tag = load_required_tag(&repo, tag_id)?;
        require_access(self.conn, actor, tag.project_id)?;
        Ok(repo.list_tagged_tasks(tag.id)?)
    }

    fn load_task_and_tag(
        &self,
        actor: &Actor,
        task_id: WorkItemId,
        tag_id: TagId,
    ) -> ServiceResult<(WorkItem, Tag)> {
        let task = require_access(self.conn, actor, task_id)?;
        require_kind(&task, WorkItemKind::Task)?;
        let tag = load_required_tag(&SqliteTagRepository::new(self.conn), tag_id)?;
        if task.parent_id != Some(tag.project_id) {
            return Err(ServiceError::TagProjectMismatch { tag_id, task_id });
        }
        Ok((task, tag))
    }
}

fn load_required_tag(repo: &impl TagRepository, tag_id: TagId) -> ServiceResult<Tag> {
    repo.get_tag(tag_id)?.ok_or(ServiceError::NotFound {
        entity: "tag",
        id: tag_id,
    })
}

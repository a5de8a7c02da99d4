//! Tag repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Tag names are unique per project.
//! - Tag listing is deterministic: `name ASC`.

use crate::model::tag::{Tag, TagId};
use crate::model::work_item::{WorkItem, WorkItemId};
use crate::repo::work_item_repo::load_work_item;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TAG_SELECT_SQL: &str = "SELECT
    tags.tag_uuid AS tag_uuid,
    tags.project_uuid AS project_uuid,
    tags.name AS name,
    tags.color AS color
FROM tags";

/// Repository interface for project tags and task/tag links.
pub trait TagRepository {
    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId>;
    fn delete_tag(&self, id: TagId) -> RepoResult<()>;
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    fn find_tag_by_name(&self, project_id: WorkItemId, name: &str) -> RepoResult<Option<Tag>>;
    fn list_tags(&self, project_id: WorkItemId) -> RepoResult<Vec<Tag>>;
    /// Links a tag to a task. Returns `false` if already linked.
    fn attach_tag(&self, task_id: WorkItemId, tag_id: TagId) -> RepoResult<bool>;
    /// Unlinks a tag from a task. Returns `false` if not linked.
    fn detach_tag(&self, task_id: WorkItemId, tag_id: TagId) -> RepoResult<bool>;
    fn list_task_tags(&self, task_id: WorkItemId) -> RepoResult<Vec<Tag>>;
    fn list_tagged_tasks(&self, tag_id: TagId) -> RepoResult<Vec<WorkItem>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId> {
        tag.validate()?;

        self.conn.execute(
            "INSERT INTO tags (tag_uuid, project_uuid, name, color)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                tag.id.to_string(),
                tag.project_id.to_string(),
                tag.name.trim(),
                tag.color.as_str(),
            ],
        )?;
        Ok(tag.id)
    }

    fn delete_tag(&self, id: TagId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tags WHERE tag_uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found("tag", id));
        }
        Ok(())
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TAG_SELECT_SQL} WHERE tags.tag_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tag_row(row)?));
        }
        Ok(None)
    }

    fn find_tag_by_name(&self, project_id: WorkItemId, name: &str) -> RepoResult<Option<Tag>> {
        let id_text: Option<String> = self
            .conn
            .query_row(
                "SELECT tag_uuid FROM tags WHERE project_uuid = ?1 AND name = ?2;",
                params![project_id.to_string(), name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        match id_text {
            None => Ok(None),
            Some(value) => self.get_tag(parse_uuid(&value, "tags.tag_uuid")?),
        }
    }

    fn list_tags(&self, project_id: WorkItemId) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL}
             WHERE tags.project_uuid = ?1
             ORDER BY tags.name ASC;"
        ))?;
        let tags = collect_tags(stmt.query([project_id.to_string()])?)?;
        Ok(tags)
    }

    fn attach_tag(&self, task_id: WorkItemId, tag_id: TagId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO task_tags (item_uuid, tag_uuid) VALUES (?1, ?2);",
            params![task_id.to_string(), tag_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn detach_tag(&self, task_id: WorkItemId, tag_id: TagId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM task_tags WHERE item_uuid = ?1 AND tag_uuid = ?2;",
            params![task_id.to_string(), tag_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn list_task_tags(&self, task_id: WorkItemId) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TAG_SELECT_SQL}
             INNER JOIN task_tags ON task_tags.tag_uuid = tags.tag_uuid
             WHERE task_tags.item_uuid = ?1
             ORDER BY tags.name ASC;"
        ))?;
        let tags = collect_tags(stmt.query([task_id.to_string()])?)?;
        Ok(tags)
    }

    fn list_tagged_tasks(&self, tag_id: TagId) -> RepoResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_tags.item_uuid
             FROM task_tags
             INNER JOIN work_items ON work_items.item_uuid = task_tags.item_uuid
             WHERE task_tags.tag_uuid = ?1
               AND work_items.active = 1
             ORDER BY work_items.created_at ASC, work_items.item_uuid ASC;",
        )?;
        let mut rows = stmt.query([tag_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "task_tags.item_uuid")?);
        }

        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            let task = load_work_item(self.conn, id)?
                .ok_or_else(|| RepoError::not_found("work item", id))?;
            tasks.push(task);
        }
        Ok(tasks)
    }
}

fn collect_tags(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Tag>> {
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(parse_tag_row(row)?);
    }
    Ok(tags)
}

fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let id_text: String = row.get("tag_uuid")?;
    let project_text: String = row.get("project_uuid")?;
    Ok(Tag {
        id: parse_uuid(&id_text, "tags.tag_uuid")?,
        project_id: parse_uuid(&project_text, "tags.project_uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
    })
}

//! Work item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist work tree nodes, their direct participants and task history.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `WorkItem::validate()` before SQL mutations.
//! - `kind`, `parent_id` and `organization_id` are immutable after insert.
//! - Child listing is deterministic: `created_at ASC, item_uuid ASC`.
//! - History is append-only and listed oldest first. Only the comment of an
//!   entry may be edited later.
//! - Deletion is soft: listings skip inactive items, point lookups do not.

use crate::model::actor::UserId;
use crate::model::history::{HistoryEntry, HistoryId};
use crate::model::organization::OrganizationId;
use crate::model::work_item::{WorkItem, WorkItemId, WorkItemKind};
use crate::repo::{
    kind_to_db, parse_kind, parse_optional_uuid, parse_progress, parse_state, parse_uuid,
    progress_to_db, state_to_db, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;

const WORK_ITEM_SELECT_SQL: &str = "SELECT
    item_uuid,
    kind,
    name,
    parent_uuid,
    org_uuid,
    state,
    progress_state,
    assigned_to,
    iteration_uuid,
    created_by,
    active,
    constraint_start,
    constraint_finish,
    estimated_minutes
FROM work_items";

const HISTORY_SELECT_SQL: &str = "SELECT
    history_uuid,
    item_uuid,
    updated_by,
    comment,
    previous_state,
    new_state,
    previous_progress_state,
    new_progress_state,
    previous_assigned_to,
    new_assigned_to,
    created_at
FROM work_history";

/// Repository interface for work tree nodes.
pub trait WorkItemRepository {
    fn create_work_item(&self, item: &WorkItem) -> RepoResult<WorkItemId>;
    /// Persists mutable fields: name, state, progress, assignee, iteration,
    /// constraint window and estimate.
    fn update_work_item(&self, item: &WorkItem) -> RepoResult<()>;
    /// Marks an item deleted. Its rows are kept.
    fn deactivate_work_item(&self, id: WorkItemId) -> RepoResult<()>;
    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>>;
    fn list_children(
        &self,
        parent_id: WorkItemId,
        kind: Option<WorkItemKind>,
    ) -> RepoResult<Vec<WorkItem>>;
    /// Lists root projects of one organization.
    fn list_root_projects(&self, organization_id: OrganizationId) -> RepoResult<Vec<WorkItem>>;
    /// Adds direct participants, ignoring ones already present.
    fn add_participants(&self, id: WorkItemId, user_ids: &[UserId]) -> RepoResult<usize>;
    /// Removes one direct participant. Returns `false` if absent.
    fn remove_participant(&self, id: WorkItemId, user_id: UserId) -> RepoResult<bool>;
    /// Clears `assigned_to` on every listed item assigned to `user_id`.
    fn clear_assignments(&self, ids: &[WorkItemId], user_id: UserId) -> RepoResult<usize>;
    fn append_history(&self, entry: &HistoryEntry) -> RepoResult<()>;
    fn list_history(&self, id: WorkItemId) -> RepoResult<Vec<HistoryEntry>>;
    fn get_history_entry(&self, id: HistoryId) -> RepoResult<Option<HistoryEntry>>;
    fn update_history_comment(&self, id: HistoryId, comment: Option<&str>) -> RepoResult<()>;
}

/// SQLite-backed work item repository.
pub struct SqliteWorkItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWorkItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl WorkItemRepository for SqliteWorkItemRepository<'_> {
    fn create_work_item(&self, item: &WorkItem) -> RepoResult<WorkItemId> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO work_items (
                item_uuid,
                kind,
                name,
                parent_uuid,
                org_uuid,
                state,
                progress_state,
                assigned_to,
                iteration_uuid,
                created_by,
                active,
                constraint_start,
                constraint_finish,
                estimated_minutes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                item.id.to_string(),
                kind_to_db(item.kind),
                item.name.trim(),
                item.parent_id.map(|value| value.to_string()),
                item.organization_id.to_string(),
                state_to_db(item.state),
                progress_to_db(item.progress_state),
                item.assigned_to.map(|value| value.to_string()),
                item.iteration_id.map(|value| value.to_string()),
                item.created_by.map(|value| value.to_string()),
                item.active,
                item.constraint_start,
                item.constraint_finish,
                item.estimated_minutes,
            ],
        )?;

        let participants: Vec<UserId> = item.participants.iter().copied().collect();
        self.add_participants(item.id, &participants)?;
        Ok(item.id)
    }

    fn update_work_item(&self, item: &WorkItem) -> RepoResult<()> {
        item.validate()?;

        let changed = self.conn.execute(
            "UPDATE work_items
             SET
                name = ?2,
                state = ?3,
                progress_state = ?4,
                assigned_to = ?5,
                iteration_uuid = ?6,
                constraint_start = ?7,
                constraint_finish = ?8,
                estimated_minutes = ?9,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1;",
            params![
                item.id.to_string(),
                item.name.trim(),
                state_to_db(item.state),
                progress_to_db(item.progress_state),
                item.assigned_to.map(|value| value.to_string()),
                item.iteration_id.map(|value| value.to_string()),
                item.constraint_start,
                item.constraint_finish,
                item.estimated_minutes,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("work item", item.id));
        }
        Ok(())
    }

    fn deactivate_work_item(&self, id: WorkItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE work_items
             SET active = 0,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("work item", id));
        }
        Ok(())
    }

    fn get_work_item(&self, id: WorkItemId) -> RepoResult<Option<WorkItem>> {
        load_work_item(self.conn, id)
    }

    fn list_children(
        &self,
        parent_id: WorkItemId,
        kind: Option<WorkItemKind>,
    ) -> RepoResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{WORK_ITEM_SELECT_SQL}
             WHERE parent_uuid = ?1
               AND active = 1
               AND (?2 IS NULL OR kind = ?2)
             ORDER BY created_at ASC, item_uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![parent_id.to_string(), kind.map(kind_to_db)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_work_item_row(self.conn, row)?);
        }
        Ok(items)
    }

    fn list_root_projects(&self, organization_id: OrganizationId) -> RepoResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{WORK_ITEM_SELECT_SQL}
             WHERE org_uuid = ?1
               AND parent_uuid IS NULL
               AND active = 1
               AND kind = 'project'
             ORDER BY created_at ASC, item_uuid ASC;"
        ))?;
        let mut rows = stmt.query([organization_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_work_item_row(self.conn, row)?);
        }
        Ok(items)
    }

    fn add_participants(&self, id: WorkItemId, user_ids: &[UserId]) -> RepoResult<usize> {
        let mut added = 0;
        for user_id in user_ids {
            added += self.conn.execute(
                "INSERT OR IGNORE INTO work_item_participants (item_uuid, user_uuid)
                 VALUES (?1, ?2);",
                params![id.to_string(), user_id.to_string()],
            )?;
        }
        Ok(added)
    }

    fn remove_participant(&self, id: WorkItemId, user_id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM work_item_participants
             WHERE item_uuid = ?1
               AND user_uuid = ?2;",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn clear_assignments(&self, ids: &[WorkItemId], user_id: UserId) -> RepoResult<usize> {
        let mut cleared = 0;
        for id in ids {
            cleared += self.conn.execute(
                "UPDATE work_items
                 SET assigned_to = NULL,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE item_uuid = ?1
                   AND assigned_to = ?2;",
                params![id.to_string(), user_id.to_string()],
            )?;
        }
        Ok(cleared)
    }

    fn append_history(&self, entry: &HistoryEntry) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO work_history (
                history_uuid,
                item_uuid,
                updated_by,
                comment,
                previous_state,
                new_state,
                previous_progress_state,
                new_progress_state,
                previous_assigned_to,
                new_assigned_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                entry.id.to_string(),
                entry.work_item_id.to_string(),
                entry.updated_by.map(|value| value.to_string()),
                entry.comment.as_deref(),
                entry.previous_state.map(state_to_db),
                entry.new_state.map(state_to_db),
                entry.previous_progress_state.map(progress_to_db),
                entry.new_progress_state.map(progress_to_db),
                entry.previous_assigned_to.map(|value| value.to_string()),
                entry.new_assigned_to.map(|value| value.to_string()),
            ],
        )?;
        Ok(())
    }

    fn list_history(&self, id: WorkItemId) -> RepoResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HISTORY_SELECT_SQL}
             WHERE item_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }

    fn get_history_entry(&self, id: HistoryId) -> RepoResult<Option<HistoryEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HISTORY_SELECT_SQL} WHERE history_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_history_row(row)?));
        }
        Ok(None)
    }

    fn update_history_comment(&self, id: HistoryId, comment: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE work_history SET comment = ?2 WHERE history_uuid = ?1;",
            params![id.to_string(), comment],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("history entry", id));
        }
        Ok(())
    }
}

pub(crate) fn load_work_item(conn: &Connection, id: WorkItemId) -> RepoResult<Option<WorkItem>> {
    let mut stmt = conn.prepare(&format!("{WORK_ITEM_SELECT_SQL} WHERE item_uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_work_item_row(conn, row)?));
    }
    Ok(None)
}

fn load_participants(conn: &Connection, id: WorkItemId) -> RepoResult<BTreeSet<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_uuid
         FROM work_item_participants
         WHERE item_uuid = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut participants = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        participants.insert(parse_uuid(&value, "work_item_participants.user_uuid")?);
    }
    Ok(participants)
}

fn parse_work_item_row(conn: &Connection, row: &Row<'_>) -> RepoResult<WorkItem> {
    let id_text: String = row.get("item_uuid")?;
    let id = parse_uuid(&id_text, "work_items.item_uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = parse_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid work item kind `{kind_text}` in work_items.kind"))
    })?;

    let state_text: String = row.get("state")?;
    let state = parse_state(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid state `{state_text}` in work_items.state"))
    })?;

    let progress_text: String = row.get("progress_state")?;
    let progress_state = parse_progress(&progress_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid progress state `{progress_text}` in work_items.progress_state"
        ))
    })?;

    let org_text: String = row.get("org_uuid")?;

    let item = WorkItem {
        id,
        kind,
        name: row.get("name")?,
        parent_id: parse_optional_uuid(row.get("parent_uuid")?, "work_items.parent_uuid")?,
        organization_id: parse_uuid(&org_text, "work_items.org_uuid")?,
        participants: load_participants(conn, id)?,
        state,
        progress_state,
        assigned_to: parse_optional_uuid(row.get("assigned_to")?, "work_items.assigned_to")?,
        iteration_id: parse_optional_uuid(
            row.get("iteration_uuid")?,
            "work_items.iteration_uuid",
        )?,
        created_by: parse_optional_uuid(row.get("created_by")?, "work_items.created_by")?,
        active: row.get("active")?,
        constraint_start: row.get("constraint_start")?,
        constraint_finish: row.get("constraint_finish")?,
        estimated_minutes: row.get("estimated_minutes")?,
    };
    Ok(item)
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let id_text: String = row.get("history_uuid")?;
    let item_text: String = row.get("item_uuid")?;

    let optional_state = |column: &'static str| -> RepoResult<_> {
        match row.get::<_, Option<String>>(column)? {
            None => Ok(None),
            Some(value) => parse_state(&value).map(Some).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid state `{value}` in work_history.{column}"))
            }),
        }
    };
    let optional_progress = |column: &'static str| -> RepoResult<_> {
        match row.get::<_, Option<String>>(column)? {
            None => Ok(None),
            Some(value) => parse_progress(&value).map(Some).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid progress state `{value}` in work_history.{column}"
                ))
            }),
        }
    };

    Ok(HistoryEntry {
        id: parse_uuid(&id_text, "work_history.history_uuid")?,
        work_item_id: parse_uuid(&item_text, "work_history.item_uuid")?,
        updated_by: parse_optional_uuid(row.get("updated_by")?, "work_history.updated_by")?,
        comment: row.get("comment")?,
        previous_state: optional_state("previous_state")?,
        new_state: optional_state("new_state")?,
        previous_progress_state: optional_progress("previous_progress_state")?,
        new_progress_state: optional_progress("new_progress_state")?,
        previous_assigned_to: parse_optional_uuid(
            row.get("previous_assigned_to")?,
            "work_history.previous_assigned_to",
        )?,
        new_assigned_to: parse_optional_uuid(
            row.get("new_assigned_to")?,
            "work_history.new_assigned_to",
        )?,
        created_at: row.get("created_at")?,
    })
}

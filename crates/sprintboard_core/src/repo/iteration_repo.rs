//! Iteration repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Iterations of one project are listed by `start_date ASC`.
//! - This repository does not check overlap; callers run
//!   `scheduling::validate_iteration` inside the same transaction first.
//! - Deleting an iteration unschedules its items (`ON DELETE SET NULL`).

use crate::model::iteration::{Iteration, IterationId};
use crate::model::work_item::{WorkItem, WorkItemId};
use crate::repo::work_item_repo::load_work_item;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const ITERATION_SELECT_SQL: &str = "SELECT
    iteration_uuid,
    project_uuid,
    name,
    start_date,
    end_date
FROM iterations";

/// Repository interface for project iterations.
pub trait IterationRepository {
    fn insert_iteration(&self, iteration: &Iteration) -> RepoResult<IterationId>;
    /// Persists new name and dates. The owning project never changes.
    fn update_iteration(&self, iteration: &Iteration) -> RepoResult<()>;
    fn delete_iteration(&self, id: IterationId) -> RepoResult<()>;
    fn get_iteration(&self, id: IterationId) -> RepoResult<Option<Iteration>>;
    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>>;
    /// Lists work items scheduled into one iteration.
    fn list_items(&self, id: IterationId) -> RepoResult<Vec<WorkItem>>;
}

/// SQLite-backed iteration repository.
pub struct SqliteIterationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIterationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl IterationRepository for SqliteIterationRepository<'_> {
    fn insert_iteration(&self, iteration: &Iteration) -> RepoResult<IterationId> {
        iteration.validate_name()?;

        self.conn.execute(
            "INSERT INTO iterations (
                iteration_uuid,
                project_uuid,
                name,
                start_date,
                end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                iteration.id.to_string(),
                iteration.project_id.to_string(),
                iteration.name.trim(),
                iteration.start_date,
                iteration.end_date,
            ],
        )?;
        Ok(iteration.id)
    }

    fn update_iteration(&self, iteration: &Iteration) -> RepoResult<()> {
        iteration.validate_name()?;

        let changed = self.conn.execute(
            "UPDATE iterations
             SET name = ?2,
                 start_date = ?3,
                 end_date = ?4
             WHERE iteration_uuid = ?1
               AND project_uuid = ?5;",
            params![
                iteration.id.to_string(),
                iteration.name.trim(),
                iteration.start_date,
                iteration.end_date,
                iteration.project_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("iteration", iteration.id));
        }
        Ok(())
    }

    fn delete_iteration(&self, id: IterationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM iterations WHERE iteration_uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("iteration", id));
        }
        Ok(())
    }

    fn get_iteration(&self, id: IterationId) -> RepoResult<Option<Iteration>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITERATION_SELECT_SQL} WHERE iteration_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_iteration_row(row)?));
        }
        Ok(None)
    }

    fn list_iterations(&self, project_id: WorkItemId) -> RepoResult<Vec<Iteration>> {
        list_project_iterations(self.conn, project_id)
    }

    fn list_items(&self, id: IterationId) -> RepoResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_uuid
             FROM work_items
             WHERE iteration_uuid = ?1
               AND active = 1
             ORDER BY created_at ASC, item_uuid ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "work_items.item_uuid")?);
        }

        let mut items = Vec::with_capacity(ids.len());
        for item_id in ids {
            let item = load_work_item(self.conn, item_id)?
                .ok_or_else(|| RepoError::not_found("work item", item_id))?;
            items.push(item);
        }
        Ok(items)
    }
}

pub(crate) fn list_project_iterations(
    conn: &Connection,
    project_id: WorkItemId,
) -> RepoResult<Vec<Iteration>> {
    let mut stmt = conn.prepare(&format!(
        "{ITERATION_SELECT_SQL}
         WHERE project_uuid = ?1
         ORDER BY start_date ASC, iteration_uuid ASC;"
    ))?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut iterations = Vec::new();
    while let Some(row) = rows.next()? {
        iterations.push(parse_iteration_row(row)?);
    }
    Ok(iterations)
}

fn parse_iteration_row(row: &Row<'_>) -> RepoResult<Iteration> {
    let id_text: String = row.get("iteration_uuid")?;
    let project_text: String = row.get("project_uuid")?;
    let start_date = parse_date(row.get("start_date")?, "iterations.start_date")?;
    let end_date = parse_date(row.get("end_date")?, "iterations.end_date")?;

    Ok(Iteration {
        id: parse_uuid(&id_text, "iterations.iteration_uuid")?,
        project_id: parse_uuid(&project_text, "iterations.project_uuid")?,
        name: row.get("name")?,
        start_date,
        end_date,
    })
}

fn parse_date(value: String, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

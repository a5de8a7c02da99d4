//! Timesheet line persistence.
//!
//! # Invariants
//! - Lines are append-only.
//! - Listing is deterministic: `work_date ASC, created_at ASC, rowid ASC`.

use crate::model::timesheet::{TimesheetLine, TimesheetLineId};
use crate::model::work_item::WorkItemId;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const TIMESHEET_SELECT_SQL: &str = "SELECT
    line_uuid,
    item_uuid,
    user_uuid,
    minutes,
    work_date,
    created_at
FROM timesheet_lines";

/// Repository interface for time logged against tasks.
pub trait TimesheetRepository {
    fn create_line(&self, line: &TimesheetLine) -> RepoResult<TimesheetLineId>;
    fn list_lines(&self, item_id: WorkItemId) -> RepoResult<Vec<TimesheetLine>>;
    /// Sum of logged minutes on one item.
    fn total_minutes(&self, item_id: WorkItemId) -> RepoResult<u64>;
}

/// SQLite-backed timesheet repository.
pub struct SqliteTimesheetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTimesheetRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TimesheetRepository for SqliteTimesheetRepository<'_> {
    fn create_line(&self, line: &TimesheetLine) -> RepoResult<TimesheetLineId> {
        line.validate()?;

        self.conn.execute(
            "INSERT INTO timesheet_lines (line_uuid, item_uuid, user_uuid, minutes, work_date)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                line.id.to_string(),
                line.work_item_id.to_string(),
                line.user_id.to_string(),
                line.minutes,
                line.work_date,
            ],
        )?;
        Ok(line.id)
    }

    fn list_lines(&self, item_id: WorkItemId) -> RepoResult<Vec<TimesheetLine>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TIMESHEET_SELECT_SQL}
             WHERE item_uuid = ?1
             ORDER BY work_date ASC, created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([item_id.to_string()])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(parse_timesheet_row(row)?);
        }
        Ok(lines)
    }

    fn total_minutes(&self, item_id: WorkItemId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(minutes), 0) FROM timesheet_lines WHERE item_uuid = ?1;",
            [item_id.to_string()],
            |row| row.get(0),
        )?;
        u64::try_from(total).map_err(|_| {
            RepoError::InvalidData(format!("negative minute total {total} in timesheet_lines"))
        })
    }
}

fn parse_timesheet_row(row: &Row<'_>) -> RepoResult<TimesheetLine> {
    let id_text: String = row.get("line_uuid")?;
    let item_text: String = row.get("item_uuid")?;
    let user_text: String = row.get("user_uuid")?;

    Ok(TimesheetLine {
        id: parse_uuid(&id_text, "timesheet_lines.line_uuid")?,
        work_item_id: parse_uuid(&item_text, "timesheet_lines.item_uuid")?,
        user_id: parse_uuid(&user_text, "timesheet_lines.user_uuid")?,
        minutes: row.get("minutes")?,
        work_date: row.get("work_date")?,
        created_at: row.get("created_at")?,
    })
}

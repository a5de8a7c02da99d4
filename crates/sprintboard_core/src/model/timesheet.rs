//! Time logged against tasks.

use crate::model::actor::UserId;
use crate::model::work_item::WorkItemId;
use crate::model::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable timesheet line identifier.
pub type TimesheetLineId = Uuid;

/// Minutes one user spent on one task on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetLine {
    pub id: TimesheetLineId,
    pub work_item_id: WorkItemId,
    pub user_id: UserId,
    pub minutes: u32,
    pub work_date: NaiveDate,
    /// Epoch milliseconds, assigned by storage.
    pub created_at: i64,
}

impl TimesheetLine {
    pub fn new(
        work_item_id: WorkItemId,
        user_id: UserId,
        minutes: u32,
        work_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            work_item_id,
            user_id,
            minutes,
            work_date,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.minutes == 0 {
            return Err(ValidationError::EmptyDuration);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TimesheetLine;
    use crate::model::ValidationError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn zero_minutes_is_rejected() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let line = TimesheetLine::new(Uuid::new_v4(), Uuid::new_v4(), 0, day);
        assert_eq!(line.validate().unwrap_err(), ValidationError::EmptyDuration);

        let line = TimesheetLine::new(Uuid::new_v4(), Uuid::new_v4(), 90, day);
        line.validate().unwrap();
    }
}

//! Iteration (sprint) domain model.
//!
//! # Invariants
//! - `start_date < end_date`; both ends are inclusive calendar days.
//! - An iteration belongs to exactly one project for its whole life.

use crate::model::work_item::WorkItemId;
use crate::model::{normalize_name, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable iteration identifier.
pub type IterationId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub id: IterationId,
    pub project_id: WorkItemId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Iteration {
    pub fn new(
        project_id: WorkItemId,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            start_date,
            end_date,
        }
    }

    /// Closed-interval overlap with `[start, end]`.
    ///
    /// Sharing a single boundary day counts as overlap.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    /// Number of calendar days covered, both ends included.
    pub fn length_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn validate_name(&self) -> Result<(), ValidationError> {
        normalize_name(&self.name).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::Iteration;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn overlap_covers_containment_and_shared_boundary() {
        let sprint = Iteration::new(Uuid::new_v4(), "S1", day("2024-01-05"), day("2024-01-10"));

        assert!(sprint.overlaps(day("2024-01-01"), day("2024-01-20")));
        assert!(sprint.overlaps(day("2024-01-06"), day("2024-01-07")));
        assert!(sprint.overlaps(day("2024-01-10"), day("2024-01-12")));
        assert!(sprint.overlaps(day("2024-01-01"), day("2024-01-05")));
        assert!(!sprint.overlaps(day("2024-01-11"), day("2024-01-12")));
        assert!(!sprint.overlaps(day("2024-01-01"), day("2024-01-04")));
    }

    #[test]
    fn length_counts_both_ends() {
        let sprint = Iteration::new(Uuid::new_v4(), "S1", day("2024-01-01"), day("2024-01-14"));
        assert_eq!(sprint.length_days(), 14);
        assert!(sprint.contains(day("2024-01-14")));
        assert!(!sprint.contains(day("2024-01-15")));
    }
}

//! Domain model for the project/task tracker.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep validation of single-record invariants next to the records.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Cross-record rules (overlap, inheritance) live outside this module.

pub mod actor;
pub mod history;
pub mod iteration;
pub mod organization;
pub mod tag;
pub mod timesheet;
pub mod work_item;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised when a single record violates its own invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is blank after trimming.
    BlankName,
    /// A task or story was given no parent.
    MissingParent,
    /// An item was made its own parent.
    SelfParent,
    /// A project item was scheduled into an iteration.
    ProjectInIteration,
    /// Tag color is not a `#rgb` or `#rrggbb` hex code.
    InvalidColor(String),
    /// Constraint start falls after constraint finish.
    ConstraintWindowReversed,
    /// Logged time must be at least one minute.
    EmptyDuration,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::MissingParent => write!(f, "tasks and stories require a parent"),
            Self::SelfParent => write!(f, "work item cannot be its own parent"),
            Self::ProjectInIteration => write!(f, "projects cannot be scheduled into iterations"),
            Self::InvalidColor(value) => write!(f, "invalid color code `{value}`"),
            Self::ConstraintWindowReversed => {
                write!(f, "constraint start must not be after constraint finish")
            }
            Self::EmptyDuration => write!(f, "logged time must be positive"),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects blank results.
pub fn normalize_name(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankName);
    }
    Ok(trimmed.to_string())
}

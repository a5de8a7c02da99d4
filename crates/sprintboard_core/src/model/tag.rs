//! Project-scoped task labels.

use crate::model::work_item::WorkItemId;
use crate::model::{normalize_name, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable tag identifier.
pub type TagId = Uuid;

pub const DEFAULT_TAG_COLOR: &str = "#999";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub project_id: WorkItemId,
    pub name: String,
    pub color: String,
}

impl Tag {
    pub fn new(project_id: WorkItemId, name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            color: color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_name(&self.name)?;
        if !is_hex_color(&self.color) {
            return Err(ValidationError::InvalidColor(self.color.clone()));
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{Tag, DEFAULT_TAG_COLOR};
    use crate::model::ValidationError;
    use uuid::Uuid;

    #[test]
    fn default_color_is_applied_and_valid() {
        let tag = Tag::new(Uuid::new_v4(), "bug", None);
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
        tag.validate().unwrap();
    }

    #[test]
    fn malformed_color_is_rejected() {
        let tag = Tag::new(Uuid::new_v4(), "bug", Some("red".to_string()));
        assert_eq!(
            tag.validate().unwrap_err(),
            ValidationError::InvalidColor("red".to_string())
        );
    }
}

//! Organization and user records.
//!
//! Users are referenced by id everywhere else in the model; this module
//! only carries what provisioning and membership checks need.

use crate::model::actor::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable organization identifier.
pub type OrganizationId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub display_name: String,
}

impl User {
    pub fn new(organization_id: OrganizationId, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            display_name: display_name.into(),
        }
    }
}

//! Acting-user context passed explicitly into every use-case call.

use crate::model::organization::OrganizationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;

/// The user performing an operation, and the organization they act in.
///
/// There is no ambient "current user": callers build one per request and
/// hand it to each service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
}

impl Actor {
    pub fn new(user_id: UserId, organization_id: OrganizationId) -> Self {
        Self {
            user_id,
            organization_id,
        }
    }
}

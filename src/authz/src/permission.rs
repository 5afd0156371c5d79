//! Permission rows binding resource type, action, role and conditions

use crate::condition::ConditionContainer;
use crate::types::{Action, ResourceType, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deployed permission rule
///
/// Identity is the (resource_type, action, role_key) triple: redeploying a
/// changeset replaces all prior rows for a triple it names. `id` is storage
/// metadata only and never participates in equality of the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Row identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Resource type this rule targets
    pub resource_type: ResourceType,

    /// Action this rule grants
    pub action: Action,

    /// Role key a principal must hold for this rule to apply
    pub role_key: Role,

    /// AND-composed conditions; empty grants unconditionally
    #[serde(default)]
    pub condition_container: ConditionContainer,
}

impl Permission {
    /// Create a permission with a fresh row id
    pub fn new(
        resource_type: ResourceType,
        action: Action,
        role_key: Role,
        condition_container: ConditionContainer,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_type,
            action,
            role_key,
            condition_container,
        }
    }

    /// The identity triple of this rule
    pub fn triple(&self) -> (&ResourceType, &Action, &Role) {
        (&self.resource_type, &self.action, &self.role_key)
    }

    /// Whether this rule belongs to the given triple
    pub fn matches_triple(&self, resource_type: &ResourceType, action: &Action, role_key: &Role) -> bool {
        &self.resource_type == resource_type && &self.action == action && &self.role_key == role_key
    }
}

/// Management-tooling projection of a permission
///
/// The read surface consumed by permission management returns these sorted
/// by (role_key, resource_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionView {
    pub resource_type: ResourceType,
    pub action: Action,
    pub conditions: ConditionContainer,
    pub role_key: Role,
}

impl From<&Permission> for PermissionView {
    fn from(permission: &Permission) -> Self {
        Self {
            resource_type: permission.resource_type.clone(),
            action: permission.action.clone(),
            conditions: permission.condition_container.clone(),
            role_key: permission.role_key.clone(),
        }
    }
}

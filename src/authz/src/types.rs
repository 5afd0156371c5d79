//! Core authorization types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Action being authorized
///
/// Actions are plain verb keys with string identity. The kernel ships the
/// well-known case-management verbs as constructors, but any custom key is
/// accepted: lookup is exact-match, there is no action hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    /// Create an action from a verb key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The verb key
    pub fn key(&self) -> &str {
        &self.0
    }

    pub fn view() -> Self {
        Self::new("VIEW")
    }

    pub fn list_view() -> Self {
        Self::new("LIST_VIEW")
    }

    pub fn edit() -> Self {
        Self::new("EDIT")
    }

    pub fn claim() -> Self {
        Self::new("CLAIM")
    }

    pub fn create() -> Self {
        Self::new("CREATE")
    }

    pub fn modify() -> Self {
        Self::new("MODIFY")
    }

    pub fn delete() -> Self {
        Self::new("DELETE")
    }

    pub fn assign() -> Self {
        Self::new("ASSIGN")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token naming a domain entity class
///
/// The kernel never owns the entity type itself; domain crates declare the
/// token through [`crate::resource::AuthorizedResource`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Create a resource-type token
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role key referenced by permissions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create a role from its key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated actor whose held roles are checked
///
/// Principals are supplied by the caller on every check and never persisted
/// by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier, carried through to denial outcomes for audit
    pub id: String,

    /// Held role keys
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// Create a principal with no roles
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    /// Add a held role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(Role::new(role));
        self
    }

    /// Whether the principal holds the given role
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_identity() {
        assert_eq!(Action::view(), Action::new("VIEW"));
        assert_ne!(Action::view(), Action::edit());
        assert_eq!(Action::new("COMPLETE").key(), "COMPLETE");
    }

    #[test]
    fn test_principal_roles() {
        let principal = Principal::new("user:anna")
            .with_role("CASE_WORKER")
            .with_role("CASE_WORKER")
            .with_role("ADMIN");

        assert_eq!(principal.roles.len(), 2);
        assert!(principal.has_role(&Role::new("CASE_WORKER")));
        assert!(!principal.has_role(&Role::new("AUDITOR")));
    }

    #[test]
    fn test_serde_transparency() {
        let action: Action = serde_json::from_str("\"VIEW\"").unwrap();
        assert_eq!(action, Action::view());

        let json = serde_json::to_string(&ResourceType::new("document")).unwrap();
        assert_eq!(json, "\"document\"");
    }
}

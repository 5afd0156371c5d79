//! Permission and role stores
//!
//! The deployed rule set is written only by the deployment path inside its
//! own transaction boundary and is read-only from the decision path's
//! perspective. Stores are trait seams so a persistent backend can be
//! plugged in; the in-memory implementations back tests and single-process
//! deployments.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::permission::{Permission, PermissionView};
use crate::types::{Action, ResourceType, Role};

/// Storage for deployed permissions
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Permissions for (resource_type, action) whose role key is held
    async fn find_for(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        roles: &BTreeSet<Role>,
    ) -> Result<Vec<Permission>>;

    /// All permissions whose role key is in the given set, sorted by
    /// (role_key, resource_type) — the management read surface
    async fn find_by_roles(&self, roles: &BTreeSet<Role>) -> Result<Vec<PermissionView>>;

    /// Whether any row exists for the identity triple
    async fn exists(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        role_key: &Role,
    ) -> Result<bool>;

    /// Replace all rows for the triple with the given rows, returning the
    /// number of rows written
    async fn replace_triple(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        role_key: &Role,
        permissions: Vec<Permission>,
    ) -> Result<usize>;

    /// Insert a single row without touching other rows of its triple
    async fn insert(&self, permission: Permission) -> Result<()>;

    /// All deployed permissions
    async fn list(&self) -> Result<Vec<Permission>>;
}

/// Storage for deployed roles
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn save(&self, role: Role) -> Result<bool>;

    async fn exists(&self, role: &Role) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Role>>;
}

type Triple = (ResourceType, Action, Role);

/// In-memory permission store
pub struct InMemoryPermissionRepository {
    rows: Arc<RwLock<HashMap<Triple, Vec<Permission>>>>,
}

impl InMemoryPermissionRepository {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryPermissionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionRepository for InMemoryPermissionRepository {
    async fn find_for(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        roles: &BTreeSet<Role>,
    ) -> Result<Vec<Permission>> {
        let rows = self.rows.read().await;
        let mut found = Vec::new();
        for role in roles {
            let key = (resource_type.clone(), action.clone(), role.clone());
            if let Some(permissions) = rows.get(&key) {
                found.extend(permissions.iter().cloned());
            }
        }
        Ok(found)
    }

    async fn find_by_roles(&self, roles: &BTreeSet<Role>) -> Result<Vec<PermissionView>> {
        let rows = self.rows.read().await;
        let mut views: Vec<PermissionView> = rows
            .values()
            .flatten()
            .filter(|p| roles.contains(&p.role_key))
            .map(PermissionView::from)
            .collect();

        views.sort_by(|a, b| {
            (&a.role_key, &a.resource_type).cmp(&(&b.role_key, &b.resource_type))
        });
        Ok(views)
    }

    async fn exists(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        role_key: &Role,
    ) -> Result<bool> {
        let rows = self.rows.read().await;
        let key = (resource_type.clone(), action.clone(), role_key.clone());
        Ok(rows.get(&key).is_some_and(|rows| !rows.is_empty()))
    }

    async fn replace_triple(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        role_key: &Role,
        permissions: Vec<Permission>,
    ) -> Result<usize> {
        let mut rows = self.rows.write().await;
        let key = (resource_type.clone(), action.clone(), role_key.clone());
        let written = permissions.len();
        if permissions.is_empty() {
            rows.remove(&key);
        } else {
            rows.insert(key, permissions);
        }
        Ok(written)
    }

    async fn insert(&self, permission: Permission) -> Result<()> {
        let mut rows = self.rows.write().await;
        let key = (
            permission.resource_type.clone(),
            permission.action.clone(),
            permission.role_key.clone(),
        );
        rows.entry(key).or_default().push(permission);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Permission>> {
        let rows = self.rows.read().await;
        Ok(rows.values().flatten().cloned().collect())
    }
}

/// In-memory role store
pub struct InMemoryRoleRepository {
    roles: Arc<RwLock<BTreeSet<Role>>>,
}

impl InMemoryRoleRepository {
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }
}

impl Default for InMemoryRoleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleRepository {
    async fn save(&self, role: Role) -> Result<bool> {
        let mut roles = self.roles.write().await;
        Ok(roles.insert(role))
    }

    async fn exists(&self, role: &Role) -> Result<bool> {
        let roles = self.roles.read().await;
        Ok(roles.contains(role))
    }

    async fn list(&self) -> Result<Vec<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.iter().cloned().collect())
    }
}

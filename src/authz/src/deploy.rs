//! Changeset deployment for permissions and roles
//!
//! Permissions and roles arrive as JSON changeset documents. Applying a
//! changeset is idempotent: a content checksum is recorded per changeset id,
//! re-applying unchanged content performs zero writes, and re-using an id
//! with different content is a checksum-verification failure. Validation
//! against the resource registry runs before any write, so a bad deployment
//! never replaces a good rule set. The durable changeset history lives with
//! the external changelog collaborator; the ledger here covers one process
//! lifetime.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::PermissionCache;
use crate::condition::ConditionContainer;
use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::registry::ResourceRegistry;
use crate::repository::{PermissionRepository, RoleRepository};
use crate::types::{Action, ResourceType, Role};

/// One permission row in a deployment document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDefinition {
    pub resource_type: ResourceType,
    pub action: Action,
    pub role_key: Role,
    #[serde(default)]
    pub condition_container: ConditionContainer,
}

impl PermissionDefinition {
    pub fn new(
        resource_type: ResourceType,
        action: Action,
        role_key: Role,
        condition_container: ConditionContainer,
    ) -> Self {
        Self {
            resource_type,
            action,
            role_key,
            condition_container,
        }
    }

    /// Materialize a repository row with a fresh id
    pub fn to_permission(&self) -> Permission {
        Permission::new(
            self.resource_type.clone(),
            self.action.clone(),
            self.role_key.clone(),
            self.condition_container.clone(),
        )
    }
}

/// Permission deployment document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionChangeset {
    pub changeset_id: String,
    pub permissions: Vec<PermissionDefinition>,
}

/// Role deployment document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeset {
    pub changeset_id: String,
    pub roles: Vec<Role>,
}

/// Result of applying a changeset
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    /// False when the unchanged changeset was already applied
    pub applied: bool,

    /// Rows written to the store
    pub rows_written: usize,
}

impl DeployOutcome {
    fn unchanged() -> Self {
        Self {
            applied: false,
            rows_written: 0,
        }
    }
}

#[derive(Clone)]
struct AppliedChangeset {
    checksum: [u8; 32],
    applied_at: DateTime<Utc>,
}

/// Ledger entry for an applied changeset
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesetRecord {
    /// Ledger key, `permissions:<id>` or `roles:<id>`
    pub key: String,
    pub applied_at: DateTime<Utc>,
}

/// Applies permission and role changesets against the stores
pub struct ChangesetDeployer {
    permissions: Arc<dyn PermissionRepository>,
    roles: Arc<dyn RoleRepository>,
    registry: Arc<ResourceRegistry>,
    cache: Option<Arc<PermissionCache>>,
    ledger: DashMap<String, AppliedChangeset>,
}

impl ChangesetDeployer {
    pub(crate) fn new(
        permissions: Arc<dyn PermissionRepository>,
        roles: Arc<dyn RoleRepository>,
        registry: Arc<ResourceRegistry>,
        cache: Option<Arc<PermissionCache>>,
    ) -> Self {
        Self {
            permissions,
            roles,
            registry,
            cache,
            ledger: DashMap::new(),
        }
    }

    /// Validate a permission changeset against the resource registry
    ///
    /// Surfaces unknown field paths and unregistered factories or mappers
    /// reachable through container conditions — all fatal before any write.
    pub fn validate_permissions(&self, changeset: &PermissionChangeset) -> Result<()> {
        for definition in &changeset.permissions {
            self.registry
                .validate_container(&definition.resource_type, &definition.condition_container)?;
        }
        Ok(())
    }

    /// Apply a permission changeset idempotently
    ///
    /// All prior rows of every (resource_type, action, role_key) triple the
    /// changeset names are replaced by the changeset's rows for that triple.
    pub async fn deploy_permissions(&self, changeset: &PermissionChangeset) -> Result<DeployOutcome> {
        let key = format!("permissions:{}", changeset.changeset_id);
        let checksum = content_checksum(changeset)?;

        if let Some(outcome) = self.check_ledger(&key, &changeset.changeset_id, checksum)? {
            return Ok(outcome);
        }

        self.validate_permissions(changeset)?;

        let mut grouped: HashMap<(ResourceType, Action, Role), Vec<Permission>> = HashMap::new();
        for definition in &changeset.permissions {
            grouped
                .entry((
                    definition.resource_type.clone(),
                    definition.action.clone(),
                    definition.role_key.clone(),
                ))
                .or_default()
                .push(definition.to_permission());
        }

        let mut rows_written = 0;
        for ((resource_type, action, role_key), rows) in grouped {
            rows_written += self
                .permissions
                .replace_triple(&resource_type, &action, &role_key, rows)
                .await?;
        }

        self.record(&key, checksum);
        info!(
            "applied permission changeset '{}': {} rows written",
            changeset.changeset_id, rows_written
        );

        Ok(DeployOutcome {
            applied: true,
            rows_written,
        })
    }

    /// Apply a role changeset idempotently
    pub async fn deploy_roles(&self, changeset: &RoleChangeset) -> Result<DeployOutcome> {
        let key = format!("roles:{}", changeset.changeset_id);
        let checksum = content_checksum(changeset)?;

        if let Some(outcome) = self.check_ledger(&key, &changeset.changeset_id, checksum)? {
            return Ok(outcome);
        }

        let mut rows_written = 0;
        for role in &changeset.roles {
            if self.roles.save(role.clone()).await? {
                rows_written += 1;
            }
        }

        self.record(&key, checksum);
        info!(
            "applied role changeset '{}': {} roles written",
            changeset.changeset_id, rows_written
        );

        Ok(DeployOutcome {
            applied: true,
            rows_written,
        })
    }

    /// Changesets applied during this process lifetime, oldest first
    pub fn history(&self) -> Vec<ChangesetRecord> {
        let mut records: Vec<ChangesetRecord> = self
            .ledger
            .iter()
            .map(|entry| ChangesetRecord {
                key: entry.key().clone(),
                applied_at: entry.value().applied_at,
            })
            .collect();
        records.sort_by_key(|record| record.applied_at);
        records
    }

    fn check_ledger(
        &self,
        key: &str,
        changeset_id: &str,
        checksum: [u8; 32],
    ) -> Result<Option<DeployOutcome>> {
        match self.ledger.get(key) {
            Some(applied) if applied.checksum == checksum => {
                debug!("changeset '{}' unchanged, skipping", changeset_id);
                Ok(Some(DeployOutcome::unchanged()))
            }
            Some(_) => Err(AuthzError::ChecksumMismatch {
                changeset_id: changeset_id.to_string(),
            }),
            None => Ok(None),
        }
    }

    fn record(&self, key: &str, checksum: [u8; 32]) {
        self.ledger.insert(
            key.to_string(),
            AppliedChangeset {
                checksum,
                applied_at: Utc::now(),
            },
        );
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}

fn content_checksum<T: Serialize>(document: &T) -> Result<[u8; 32]> {
    let bytes = serde_json::to_vec(document)
        .map_err(|e| AuthzError::InvalidDeployment(format!("unserializable changeset: {e}")))?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{FieldCondition, PermissionCondition};
    use crate::registry::DEFAULT_MAX_DEPTH;
    use crate::repository::{InMemoryPermissionRepository, InMemoryRoleRepository};
    use crate::resource::{AuthorizedResource, FieldAccessors};
    use serde_json::json;

    #[derive(Clone)]
    struct Document {
        status: String,
    }

    impl AuthorizedResource for Document {
        fn resource_type() -> ResourceType {
            ResourceType::new("document")
        }
    }

    fn deployer() -> ChangesetDeployer {
        let mut registry = ResourceRegistry::new(DEFAULT_MAX_DEPTH);
        registry.register_resource::<Document>(
            FieldAccessors::new().field("status", |d: &Document| Some(json!(d.status))),
        );
        ChangesetDeployer::new(
            Arc::new(InMemoryPermissionRepository::new()),
            Arc::new(InMemoryRoleRepository::new()),
            Arc::new(registry),
            None,
        )
    }

    fn changeset(id: &str, status: &str) -> PermissionChangeset {
        PermissionChangeset {
            changeset_id: id.to_string(),
            permissions: vec![PermissionDefinition::new(
                ResourceType::new("document"),
                Action::view(),
                Role::new("CASE_WORKER"),
                ConditionContainer::new(vec![PermissionCondition::Field(FieldCondition::new(
                    "status", status,
                ))]),
            )],
        }
    }

    #[tokio::test]
    async fn test_redeploy_unchanged_writes_nothing() {
        let deployer = deployer();
        let changeset = changeset("v1", "OPEN");

        let first = deployer.deploy_permissions(&changeset).await.unwrap();
        assert!(first.applied);
        assert_eq!(first.rows_written, 1);

        let second = deployer.deploy_permissions(&changeset).await.unwrap();
        assert!(!second.applied);
        assert_eq!(second.rows_written, 0);

        assert_eq!(deployer.permissions.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_content_same_id_fails_checksum() {
        let deployer = deployer();
        deployer
            .deploy_permissions(&changeset("v1", "OPEN"))
            .await
            .unwrap();

        let result = deployer.deploy_permissions(&changeset("v1", "CLOSED")).await;
        assert!(matches!(result, Err(AuthzError::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn test_redeploy_replaces_triple_rows() {
        let deployer = deployer();
        deployer
            .deploy_permissions(&changeset("v1", "OPEN"))
            .await
            .unwrap();
        deployer
            .deploy_permissions(&changeset("v2", "CLOSED"))
            .await
            .unwrap();

        let rows = deployer.permissions.list().await.unwrap();
        assert_eq!(rows.len(), 1, "v2 replaces the triple's prior rows");
        match &rows[0].condition_container.conditions[0] {
            PermissionCondition::Field(field) => {
                assert_eq!(field.expected_value, json!("CLOSED"));
            }
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_field_path_rejected_before_write() {
        let deployer = deployer();
        let bad = PermissionChangeset {
            changeset_id: "v1".to_string(),
            permissions: vec![PermissionDefinition::new(
                ResourceType::new("document"),
                Action::view(),
                Role::new("CASE_WORKER"),
                ConditionContainer::new(vec![PermissionCondition::Field(FieldCondition::new(
                    "nope", "x",
                ))]),
            )],
        };

        let result = deployer.deploy_permissions(&bad).await;
        assert!(matches!(result, Err(AuthzError::UnknownField { .. })));
        assert!(deployer.permissions.list().await.unwrap().is_empty());

        // A failed apply must not poison the ledger for the id.
        let good = changeset("v1", "OPEN");
        assert!(deployer.deploy_permissions(&good).await.unwrap().applied);
    }

    #[tokio::test]
    async fn test_history_records_applied_changesets() {
        let deployer = deployer();
        deployer
            .deploy_permissions(&changeset("v1", "OPEN"))
            .await
            .unwrap();
        deployer
            .deploy_roles(&RoleChangeset {
                changeset_id: "roles-v1".to_string(),
                roles: vec![Role::new("CASE_WORKER")],
            })
            .await
            .unwrap();

        let history = deployer.history();
        let keys: Vec<&str> = history.iter().map(|r| r.key.as_str()).collect();
        assert!(keys.contains(&"permissions:v1"));
        assert!(keys.contains(&"roles:roles-v1"));
    }

    #[tokio::test]
    async fn test_role_changeset_idempotent() {
        let deployer = deployer();
        let changeset = RoleChangeset {
            changeset_id: "roles-v1".to_string(),
            roles: vec![Role::new("CASE_WORKER"), Role::new("ADMIN")],
        };

        let first = deployer.deploy_roles(&changeset).await.unwrap();
        assert_eq!(first.rows_written, 2);

        let second = deployer.deploy_roles(&changeset).await.unwrap();
        assert!(!second.applied);
        assert_eq!(deployer.roles.list().await.unwrap().len(), 2);
    }

    #[test]
    fn test_wire_format() {
        let raw = json!({
            "changesetId": "permissions-v1",
            "permissions": [{
                "resourceType": "document",
                "action": "VIEW",
                "roleKey": "CASE_WORKER",
                "conditionContainer": {
                    "conditions": [
                        {"type": "field", "path": "status", "expectedValue": "OPEN"}
                    ]
                }
            }]
        });

        let changeset: PermissionChangeset = serde_json::from_value(raw).unwrap();
        assert_eq!(changeset.changeset_id, "permissions-v1");
        assert_eq!(changeset.permissions.len(), 1);
    }
}

//! Authorization service facade
//!
//! One service instance is constructed per deployment and passed to every
//! call site; there is no global service holder. The builder wires resource
//! registrations, mapper links, stores and the cache, and hands out the
//! facade plus its changeset deployer.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheConfig, PermissionCache};
use crate::context::AuthorizationContext;
use crate::deploy::{ChangesetDeployer, PermissionDefinition};
use crate::error::{AuthzError, Result};
use crate::mapper::AuthorizationEntityMapper;
use crate::permission::PermissionView;
use crate::registry::{ResourceRegistry, DEFAULT_MAX_DEPTH};
use crate::repository::{
    InMemoryPermissionRepository, InMemoryRoleRepository, PermissionRepository, RoleRepository,
};
use crate::resource::{AuthorizedResource, FieldAccessors};
use crate::specification::factory::{
    AuthorizationSpecificationFactory, PermissionSpecificationFactory,
};
use crate::specification::AuthorizationSpecification;
use crate::types::{Action, Principal, ResourceType, Role};

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Cache permission lookups per (resource type, action, role set)
    pub enable_cache: bool,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Cap on container-condition recursion depth
    pub max_container_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache: CacheConfig::default(),
            max_container_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// One tuple of the batch availability probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub resource_type: ResourceType,
    pub action: Action,
}

/// Facade over permission lookup, specification building and deployment
pub struct AuthorizationService {
    permissions: Arc<dyn PermissionRepository>,
    roles: Arc<dyn RoleRepository>,
    registry: Arc<ResourceRegistry>,
    cache: Option<Arc<PermissionCache>>,
    deployer: ChangesetDeployer,
}

impl AuthorizationService {
    pub fn builder() -> AuthorizationServiceBuilder {
        AuthorizationServiceBuilder::new()
    }

    /// The deployer applying changesets against this service's stores
    pub fn deployer(&self) -> &ChangesetDeployer {
        &self.deployer
    }

    /// Fail with [`AuthzError::AccessDenied`] unless the principal may
    /// perform `action` on `instance`
    ///
    /// Bypassed entirely while an elevation scope is active on `ctx`.
    pub async fn require_permission<T: AuthorizedResource>(
        &self,
        ctx: &AuthorizationContext,
        principal: &Principal,
        action: &Action,
        instance: &T,
    ) -> Result<()> {
        if ctx.is_bypassed() {
            debug!(
                "bypass active, skipping {} check on {}",
                action,
                T::resource_type()
            );
            return Ok(());
        }

        if self.check_instance(principal, action, instance).await? {
            Ok(())
        } else {
            debug!(
                "denied {} on {} for principal '{}'",
                action,
                T::resource_type(),
                principal.id
            );
            Err(AuthzError::AccessDenied {
                resource_type: T::resource_type(),
                action: action.clone(),
                principal: principal.id.clone(),
            })
        }
    }

    /// Non-throwing probe for `action` on a concrete instance
    pub async fn is_authorized<T: AuthorizedResource>(
        &self,
        ctx: &AuthorizationContext,
        principal: &Principal,
        action: &Action,
        instance: &T,
    ) -> Result<bool> {
        if ctx.is_bypassed() {
            return Ok(true);
        }
        self.check_instance(principal, action, instance).await
    }

    /// Non-throwing capability probe without an instance
    pub async fn is_authorized_without_instance<T: AuthorizedResource>(
        &self,
        ctx: &AuthorizationContext,
        principal: &Principal,
        action: &Action,
    ) -> Result<bool> {
        if ctx.is_bypassed() {
            return Ok(true);
        }
        let specification = self.get_specification::<T>(principal, action).await?;
        Ok(specification.is_satisfiable_without_instance())
    }

    /// Specification for query filtering
    ///
    /// Fails with [`AuthzError::MissingFactory`] when `T` was never
    /// registered on the builder.
    pub async fn get_specification<T: AuthorizedResource>(
        &self,
        principal: &Principal,
        action: &Action,
    ) -> Result<AuthorizationSpecification<T>> {
        self.factory::<T>().create(principal, action).await
    }

    /// Management read surface: permissions of a role set, sorted by
    /// (role_key, resource_type)
    pub async fn search_permissions(&self, roles: &BTreeSet<Role>) -> Result<Vec<PermissionView>> {
        self.permissions.find_by_roles(roles).await
    }

    /// Deployed roles, for management tooling
    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.roles.list().await
    }

    /// Batch availability probe with per-item boolean results
    ///
    /// An item is available when at least one deployed permission for its
    /// (resource_type, action) matches a role the principal holds. Items
    /// are independent; order is preserved.
    pub async fn check_available(
        &self,
        principal: &Principal,
        requests: &[AvailabilityRequest],
    ) -> Result<Vec<bool>> {
        let lookups = requests.iter().map(|request| {
            let permissions = &self.permissions;
            let roles = &principal.roles;
            async move {
                let found = permissions
                    .find_for(&request.resource_type, &request.action, roles)
                    .await?;
                Ok::<bool, AuthzError>(!found.is_empty())
            }
        });
        try_join_all(lookups).await
    }

    /// Seed a default permission set on first run
    ///
    /// A default is applied only when its (resource_type, action, role_key)
    /// triple has no persisted permission yet; existing rules are never
    /// overwritten. Returns the number of rows written.
    pub async fn seed_defaults(&self, defaults: &[PermissionDefinition]) -> Result<usize> {
        let mut written = 0;
        for definition in defaults {
            let exists = self
                .permissions
                .exists(
                    &definition.resource_type,
                    &definition.action,
                    &definition.role_key,
                )
                .await?;
            if exists {
                continue;
            }

            self.registry
                .validate_container(&definition.resource_type, &definition.condition_container)?;
            self.permissions.insert(definition.to_permission()).await?;
            written += 1;
        }

        if written > 0 {
            if let Some(cache) = &self.cache {
                cache.clear();
            }
            info!("seeded {} default permissions", written);
        }
        Ok(written)
    }

    fn factory<T: AuthorizedResource>(&self) -> PermissionSpecificationFactory<T> {
        PermissionSpecificationFactory::new(
            Arc::clone(&self.permissions),
            self.cache.clone(),
            Arc::clone(&self.registry),
        )
    }

    async fn check_instance<T: AuthorizedResource>(
        &self,
        principal: &Principal,
        action: &Action,
        instance: &T,
    ) -> Result<bool> {
        let specification = self.get_specification::<T>(principal, action).await?;
        specification.is_satisfied_by(instance).await
    }
}

/// Builder wiring resource registrations, mappers, stores and config
pub struct AuthorizationServiceBuilder {
    config: ServiceConfig,
    registry: ResourceRegistry,
    permissions: Option<Arc<dyn PermissionRepository>>,
    roles: Option<Arc<dyn RoleRepository>>,
}

impl AuthorizationServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
            registry: ResourceRegistry::new(DEFAULT_MAX_DEPTH),
            permissions: None,
            roles: None,
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom permission store (defaults to in-memory)
    pub fn with_permission_repository(mut self, repository: Arc<dyn PermissionRepository>) -> Self {
        self.permissions = Some(repository);
        self
    }

    /// Use a custom role store (defaults to in-memory)
    pub fn with_role_repository(mut self, repository: Arc<dyn RoleRepository>) -> Self {
        self.roles = Some(repository);
        self
    }

    /// Register a resource type and its field accessors
    pub fn register_resource<T: AuthorizedResource>(mut self, accessors: FieldAccessors<T>) -> Self {
        self.registry.register_resource::<T>(accessors);
        self
    }

    /// Register the entity mapper for a (source, related) pair
    pub fn register_mapper<S, T, M>(mut self, mapper: M) -> Self
    where
        S: AuthorizedResource,
        T: AuthorizedResource,
        M: AuthorizationEntityMapper<S, T> + 'static,
    {
        self.registry.register_mapper::<S, T, M>(mapper);
        self
    }

    pub fn build(mut self) -> AuthorizationService {
        self.registry.set_max_depth(self.config.max_container_depth);
        let registry = Arc::new(self.registry);

        let permissions = self
            .permissions
            .unwrap_or_else(|| Arc::new(InMemoryPermissionRepository::new()));
        let roles = self
            .roles
            .unwrap_or_else(|| Arc::new(InMemoryRoleRepository::new()));

        let cache = if self.config.enable_cache {
            Some(Arc::new(PermissionCache::new(self.config.cache.clone())))
        } else {
            None
        };

        let deployer = ChangesetDeployer::new(
            Arc::clone(&permissions),
            Arc::clone(&roles),
            Arc::clone(&registry),
            cache.clone(),
        );

        info!(
            "AuthorizationService initialized with cache={}, max_depth={}",
            self.config.enable_cache, self.config.max_container_depth
        );

        AuthorizationService {
            permissions,
            roles,
            registry,
            cache,
            deployer,
        }
    }
}

impl Default for AuthorizationServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

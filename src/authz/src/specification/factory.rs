//! Specification factories
//!
//! A factory builds the [`AuthorizationSpecification`] for one resource type
//! from the permissions a principal's roles select, resolving the mappers
//! and related types the deployed container conditions require. Resolution
//! failures are configuration errors raised before the specification is
//! handed out, not at some later evaluation.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::PermissionCache;
use crate::error::{AuthzError, Result};
use crate::permission::Permission;
use crate::registry::ResourceRegistry;
use crate::repository::PermissionRepository;
use crate::resource::AuthorizedResource;
use crate::specification::AuthorizationSpecification;
use crate::types::{Action, Principal};

/// Builds authorization specifications for `T`
#[async_trait]
pub trait AuthorizationSpecificationFactory<T: AuthorizedResource>: Send + Sync {
    async fn create(
        &self,
        principal: &Principal,
        action: &Action,
    ) -> Result<AuthorizationSpecification<T>>;
}

/// Factory backed by the permission repository and resource registry
pub struct PermissionSpecificationFactory<T> {
    repository: Arc<dyn PermissionRepository>,
    cache: Option<Arc<PermissionCache>>,
    registry: Arc<ResourceRegistry>,
    _entity: PhantomData<fn(&T)>,
}

impl<T: AuthorizedResource> PermissionSpecificationFactory<T> {
    pub(crate) fn new(
        repository: Arc<dyn PermissionRepository>,
        cache: Option<Arc<PermissionCache>>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            repository,
            cache,
            registry,
            _entity: PhantomData,
        }
    }

    async fn load_permissions(
        &self,
        principal: &Principal,
        action: &Action,
    ) -> Result<Vec<Permission>> {
        let resource_type = T::resource_type();

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&resource_type, action, &principal.roles) {
                return Ok(cached);
            }
        }

        let permissions = self
            .repository
            .find_for(&resource_type, action, &principal.roles)
            .await?;

        if let Some(cache) = &self.cache {
            cache.put(&resource_type, action, &principal.roles, permissions.clone());
        }
        Ok(permissions)
    }
}

#[async_trait]
impl<T: AuthorizedResource> AuthorizationSpecificationFactory<T>
    for PermissionSpecificationFactory<T>
{
    async fn create(
        &self,
        principal: &Principal,
        action: &Action,
    ) -> Result<AuthorizationSpecification<T>> {
        let resource_type = T::resource_type();
        if !self.registry.is_registered(&resource_type) {
            return Err(AuthzError::MissingFactory(resource_type));
        }

        let permissions = self.load_permissions(principal, action).await?;

        // Resolve everything the containers reference while building, so a
        // bad deployment fails here instead of mid-evaluation.
        for permission in &permissions {
            self.registry
                .validate_container(&resource_type, &permission.condition_container)?;
        }

        Ok(AuthorizationSpecification::new(
            action.clone(),
            permissions,
            Arc::clone(&self.registry),
        ))
    }
}

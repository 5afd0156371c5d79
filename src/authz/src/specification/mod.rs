//! Authorization specifications
//!
//! A specification aggregates the permissions applicable to a principal for
//! one (resource type, action) pair. Semantics are union across permissions
//! (a single satisfied permission authorizes) and intersection within one
//! permission's condition container — an allow-list model with no explicit
//! deny rule. The same specification answers single-instance checks and
//! compiles into a query predicate for bulk listings.

pub mod factory;
pub mod predicate;

pub use factory::{AuthorizationSpecificationFactory, PermissionSpecificationFactory};
pub use predicate::QueryPredicate;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::permission::Permission;
use crate::registry::ResourceRegistry;
use crate::resource::AuthorizedResource;
use crate::types::Action;

/// Compiled representation of "which instances are allowed" for a principal
pub struct AuthorizationSpecification<T: AuthorizedResource> {
    action: Action,
    permissions: Vec<Permission>,
    registry: Arc<ResourceRegistry>,
    _entity: PhantomData<fn(&T)>,
}

impl<T: AuthorizedResource> AuthorizationSpecification<T> {
    pub(crate) fn new(
        action: Action,
        permissions: Vec<Permission>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            action,
            permissions,
            registry,
            _entity: PhantomData,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The permissions backing this specification
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Instance check: at least one permission's container is satisfied
    pub async fn is_satisfied_by(&self, instance: &T) -> Result<bool> {
        let resource_type = T::resource_type();
        for permission in &self.permissions {
            let mut visited = vec![resource_type.clone()];
            let satisfied = self
                .registry
                .evaluate(
                    &resource_type,
                    &permission.condition_container,
                    instance,
                    &mut visited,
                )
                .await?;
            if satisfied {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Capability check without an instance (e.g. menu visibility)
    ///
    /// True iff at least one permission's container is statically
    /// satisfiable — empty, or composed only of conditions that need no
    /// instance data.
    pub fn is_satisfiable_without_instance(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| p.condition_container.is_satisfiable_without_instance())
    }

    /// In-memory post-filter for backends without predicate push-down
    pub async fn filter<'a>(&self, instances: &'a [T]) -> Result<Vec<&'a T>> {
        let mut allowed = Vec::new();
        for instance in instances {
            if self.is_satisfied_by(instance).await? {
                allowed.push(instance);
            }
        }
        Ok(allowed)
    }

    /// Compile the rule set into a query-filtering predicate
    ///
    /// The predicate mirrors the condition tree: disjunction across
    /// permissions, conjunction within each container, correlated
    /// sub-predicates for container conditions. With no applicable
    /// permission the result is [`QueryPredicate::Nothing`].
    pub fn to_predicate(&self) -> Result<QueryPredicate> {
        let resource_type = T::resource_type();
        let per_permission = self
            .permissions
            .iter()
            .map(|p| {
                self.registry
                    .compile_container(&resource_type, &p.condition_container)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryPredicate::or(per_permission))
    }
}

//! Entity mappers bridging container conditions across resource types

use crate::error::{AuthzError, Result};
use crate::resource::AuthorizedResource;
use async_trait::async_trait;
use std::any::Any;
use std::marker::PhantomData;

/// Resolves the related `T` instance for an `S` instance
///
/// Mappers are pure lookups: they may perform a blocking external read but
/// must not mutate anything. A mapper is selected by the exact (S, T)
/// resource-type pair; a container condition referencing a pair with no
/// registered mapper is a deployment-time configuration error. Returning
/// `Ok(None)` (no relation) makes the delegating condition unsatisfied.
#[async_trait]
pub trait AuthorizationEntityMapper<S, T>: Send + Sync {
    async fn map(&self, instance: &S) -> Result<Option<T>>;
}

pub(crate) type AnyInstance = dyn Any + Send + Sync;

/// Type-erased mapper edge stored in the resource registry
///
/// Evaluation crosses type boundaries through these links: the source
/// instance is handed over as `dyn Any`, downcast to the concrete source
/// type, mapped, and the related instance is boxed back up for the related
/// type's evaluator.
#[async_trait]
pub(crate) trait ErasedMapper: Send + Sync {
    async fn map_erased(&self, instance: &AnyInstance) -> Result<Option<Box<AnyInstance>>>;
}

pub(crate) struct MapperLink<S, T, M> {
    mapper: M,
    _marker: PhantomData<fn(&S) -> T>,
}

impl<S, T, M> MapperLink<S, T, M> {
    pub(crate) fn new(mapper: M) -> Self {
        Self {
            mapper,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T, M> ErasedMapper for MapperLink<S, T, M>
where
    S: AuthorizedResource,
    T: AuthorizedResource,
    M: AuthorizationEntityMapper<S, T>,
{
    async fn map_erased(&self, instance: &AnyInstance) -> Result<Option<Box<AnyInstance>>> {
        let source = instance.downcast_ref::<S>().ok_or_else(|| {
            AuthzError::Evaluation(format!(
                "instance handed to mapper is not a '{}'",
                S::resource_type()
            ))
        })?;

        let related = self.mapper.map(source).await?;
        Ok(related.map(|instance| Box::new(instance) as Box<AnyInstance>))
    }
}

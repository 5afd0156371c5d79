//! Resource registry and type-erased condition evaluation
//!
//! The registry holds one erased evaluator per registered resource type and
//! one erased mapper per registered (source, related) pair. Container
//! conditions recurse through it: the evaluator for the current type maps
//! the instance across the registered relation and hands the related
//! instance to the related type's own evaluator. A visited-type list guards
//! against type-level mapping cycles, which are a configuration error, not
//! an assumed impossibility.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::condition::{
    expression, ConditionContainer, ContainerCondition, ExpressionCondition, FieldCondition,
    PermissionCondition,
};
use crate::error::{AuthzError, Result};
use crate::mapper::{AnyInstance, AuthorizationEntityMapper, ErasedMapper, MapperLink};
use crate::resource::{AuthorizedResource, FieldAccessors};
use crate::specification::QueryPredicate;
use crate::types::ResourceType;

/// Default cap on container recursion depth
pub(crate) const DEFAULT_MAX_DEPTH: usize = 10;

/// Evaluates condition containers against erased instances of one type
#[async_trait]
pub(crate) trait ErasedEvaluator: Send + Sync {
    fn resource_type(&self) -> &ResourceType;

    /// Whether the type's accessor registry declares a field path
    fn declares(&self, path: &str) -> bool;

    async fn evaluate_container(
        &self,
        registry: &ResourceRegistry,
        container: &ConditionContainer,
        instance: &AnyInstance,
        visited: &mut Vec<ResourceType>,
    ) -> Result<bool>;
}

struct TypedEvaluator<T> {
    resource_type: ResourceType,
    accessors: FieldAccessors<T>,
}

impl<T: AuthorizedResource> TypedEvaluator<T> {
    fn eval_field(&self, condition: &FieldCondition, instance: &T) -> Result<bool> {
        let resolved = self
            .accessors
            .resolve(&condition.path, instance)
            .ok_or_else(|| AuthzError::UnknownField {
                resource_type: self.resource_type.clone(),
                path: condition.path.clone(),
            })?;

        // A null resolved value only matches a null expected value.
        let resolved = resolved.unwrap_or(serde_json::Value::Null);
        Ok(resolved == condition.expected_value)
    }

    fn eval_expression(&self, condition: &ExpressionCondition, instance: &T) -> Result<bool> {
        let document = self
            .accessors
            .resolve(&condition.path, instance)
            .ok_or_else(|| AuthzError::UnknownField {
                resource_type: self.resource_type.clone(),
                path: condition.path.clone(),
            })?;

        let Some(document) = document else {
            return Ok(false);
        };
        let Some(scalar) = expression::extract(&document, &condition.sub_expression) else {
            return Ok(false);
        };

        Ok(expression::compare(
            scalar,
            condition.operator,
            &condition.value,
            condition.value_type,
        ))
    }

    async fn eval_related(
        &self,
        registry: &ResourceRegistry,
        condition: &ContainerCondition,
        instance: &AnyInstance,
        visited: &mut Vec<ResourceType>,
    ) -> Result<bool> {
        let related_type = &condition.related_resource_type;

        if visited.contains(related_type) {
            let chain = visited
                .iter()
                .map(ToString::to_string)
                .chain(std::iter::once(related_type.to_string()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(AuthzError::MapperCycle { chain });
        }
        if visited.len() >= registry.max_depth {
            return Err(AuthzError::DepthExceeded(registry.max_depth));
        }

        let mapper = registry.mapper(&self.resource_type, related_type)?;
        let evaluator = registry.evaluator(related_type)?;

        let Some(related_instance) = mapper.map_erased(instance).await? else {
            // No relation resolved: the condition is simply not satisfied.
            return Ok(false);
        };

        visited.push(related_type.clone());
        let satisfied = evaluator
            .evaluate_container(
                registry,
                &condition.related_conditions,
                related_instance.as_ref(),
                visited,
            )
            .await;
        visited.pop();
        satisfied
    }
}

#[async_trait]
impl<T: AuthorizedResource> ErasedEvaluator for TypedEvaluator<T> {
    fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    fn declares(&self, path: &str) -> bool {
        self.accessors.declares(path)
    }

    async fn evaluate_container(
        &self,
        registry: &ResourceRegistry,
        container: &ConditionContainer,
        instance: &AnyInstance,
        visited: &mut Vec<ResourceType>,
    ) -> Result<bool> {
        let typed = instance.downcast_ref::<T>().ok_or_else(|| {
            AuthzError::Evaluation(format!(
                "instance handed to evaluator is not a '{}'",
                self.resource_type
            ))
        })?;

        // AND over members, short-circuiting on the first unsatisfied one.
        for condition in &container.conditions {
            let satisfied = match condition {
                PermissionCondition::Field(field) => self.eval_field(field, typed)?,
                PermissionCondition::Expression(expr) => self.eval_expression(expr, typed)?,
                PermissionCondition::Container(related) => {
                    self.eval_related(registry, related, instance, visited).await?
                }
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Registered resource types, field accessors and mapper links
pub(crate) struct ResourceRegistry {
    evaluators: HashMap<ResourceType, Arc<dyn ErasedEvaluator>>,
    mappers: HashMap<(ResourceType, ResourceType), Arc<dyn ErasedMapper>>,
    max_depth: usize,
}

impl ResourceRegistry {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            evaluators: HashMap::new(),
            mappers: HashMap::new(),
            max_depth,
        }
    }

    pub(crate) fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub(crate) fn register_resource<T: AuthorizedResource>(&mut self, accessors: FieldAccessors<T>) {
        let resource_type = T::resource_type();
        let evaluator = TypedEvaluator::<T> {
            resource_type: resource_type.clone(),
            accessors,
        };
        self.evaluators.insert(resource_type, Arc::new(evaluator));
    }

    pub(crate) fn register_mapper<S, T, M>(&mut self, mapper: M)
    where
        S: AuthorizedResource,
        T: AuthorizedResource,
        M: AuthorizationEntityMapper<S, T> + 'static,
    {
        self.mappers.insert(
            (S::resource_type(), T::resource_type()),
            Arc::new(MapperLink::<S, T, M>::new(mapper)),
        );
    }

    pub(crate) fn is_registered(&self, resource_type: &ResourceType) -> bool {
        self.evaluators.contains_key(resource_type)
    }

    pub(crate) fn evaluator(&self, resource_type: &ResourceType) -> Result<&Arc<dyn ErasedEvaluator>> {
        self.evaluators
            .get(resource_type)
            .ok_or_else(|| AuthzError::MissingFactory(resource_type.clone()))
    }

    fn mapper(&self, from: &ResourceType, to: &ResourceType) -> Result<&Arc<dyn ErasedMapper>> {
        self.mappers
            .get(&(from.clone(), to.clone()))
            .ok_or_else(|| AuthzError::MissingMapper {
                from: from.clone(),
                to: to.clone(),
            })
    }

    /// Evaluate a condition container against an instance of `resource_type`
    ///
    /// `visited` seeds the cycle guard and must contain the root type.
    pub(crate) async fn evaluate(
        &self,
        resource_type: &ResourceType,
        container: &ConditionContainer,
        instance: &AnyInstance,
        visited: &mut Vec<ResourceType>,
    ) -> Result<bool> {
        let evaluator = self.evaluator(resource_type)?;
        evaluator
            .evaluate_container(self, container, instance, visited)
            .await
    }

    /// Compile a condition container into a query predicate
    ///
    /// Also serves as deployment validation: unknown field paths, missing
    /// mappers and unregistered related types are all surfaced here, before
    /// any decision is served against the deployed rules.
    pub(crate) fn compile_container(
        &self,
        resource_type: &ResourceType,
        container: &ConditionContainer,
    ) -> Result<QueryPredicate> {
        let evaluator = self.evaluator(resource_type)?;

        let mut parts = Vec::with_capacity(container.conditions.len());
        for condition in &container.conditions {
            let predicate = match condition {
                PermissionCondition::Field(field) => {
                    self.ensure_declared(evaluator.as_ref(), &field.path)?;
                    QueryPredicate::Eq {
                        path: field.path.clone(),
                        value: field.expected_value.clone(),
                    }
                }
                PermissionCondition::Expression(expr) => {
                    self.ensure_declared(evaluator.as_ref(), &expr.path)?;
                    QueryPredicate::Expression {
                        path: expr.path.clone(),
                        sub_expression: expr.sub_expression.clone(),
                        operator: expr.operator,
                        value: expr.value.clone(),
                        value_type: expr.value_type,
                    }
                }
                PermissionCondition::Container(related) => {
                    self.mapper(resource_type, &related.related_resource_type)?;
                    let inner = self.compile_container(
                        &related.related_resource_type,
                        &related.related_conditions,
                    )?;
                    QueryPredicate::Related {
                        resource_type: related.related_resource_type.clone(),
                        predicate: Box::new(inner),
                    }
                }
            };
            parts.push(predicate);
        }

        Ok(QueryPredicate::and(parts))
    }

    /// Validate a condition container without keeping the compiled predicate
    pub(crate) fn validate_container(
        &self,
        resource_type: &ResourceType,
        container: &ConditionContainer,
    ) -> Result<()> {
        self.compile_container(resource_type, container).map(|_| ())
    }

    fn ensure_declared(&self, evaluator: &dyn ErasedEvaluator, path: &str) -> Result<()> {
        if evaluator.declares(path) {
            Ok(())
        } else {
            Err(AuthzError::UnknownField {
                resource_type: evaluator.resource_type().clone(),
                path: path.to_string(),
            })
        }
    }
}

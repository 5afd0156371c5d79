//! Permission condition tree
//!
//! Conditions form a closed tagged union: `field` (equality on a registered
//! field path), `expression` (comparison against a scalar extracted from a
//! semi-structured document field), and `container` (delegation to a related
//! resource type reached through a registered entity mapper). The serde
//! `type` tag is the decoder registry: adding a variant means adding an enum
//! arm and its evaluation rule, never touching call sites.

pub mod expression;

pub use expression::{Operator, ValueType};

use crate::types::ResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single condition inside a permission's container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PermissionCondition {
    /// Equality test on a value reached by a registered field path
    #[serde(rename = "field")]
    Field(FieldCondition),

    /// Comparison against a scalar extracted from a document field
    #[serde(rename = "expression")]
    Expression(ExpressionCondition),

    /// Delegation to a related resource type via a registered mapper
    #[serde(rename = "container")]
    Container(ContainerCondition),
}

impl PermissionCondition {
    /// Whether evaluating this condition needs a concrete instance
    ///
    /// Capability checks (no instance at hand, e.g. menu visibility) only
    /// accept permissions whose conditions all report `false` here. Every
    /// current variant inspects instance data.
    pub fn requires_instance(&self) -> bool {
        match self {
            PermissionCondition::Field(_) => true,
            PermissionCondition::Expression(_) => true,
            PermissionCondition::Container(_) => true,
        }
    }

    /// The serde discriminator of this condition
    pub fn kind(&self) -> &'static str {
        match self {
            PermissionCondition::Field(_) => "field",
            PermissionCondition::Expression(_) => "expression",
            PermissionCondition::Container(_) => "container",
        }
    }
}

/// Equality test on a field value
///
/// A `null` resolved value against a non-null `expected_value` is simply
/// "not satisfied". A path the resource type never declared is a
/// configuration error raised at evaluation and rejected at deployment
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCondition {
    /// Dotted path registered in the resource type's accessor registry
    pub path: String,

    /// Value the resolved field must equal
    pub expected_value: Value,
}

impl FieldCondition {
    pub fn new(path: impl Into<String>, expected_value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            expected_value: expected_value.into(),
        }
    }
}

/// Comparison against a scalar extracted from a document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionCondition {
    /// Registered path resolving to the document value
    pub path: String,

    /// `$.a.b` extraction applied to the document value
    pub sub_expression: String,

    /// Comparison operator
    pub operator: Operator,

    /// Right-hand operand
    pub value: Value,

    /// Type both operands are coerced to
    pub value_type: ValueType,
}

impl ExpressionCondition {
    pub fn new(
        path: impl Into<String>,
        sub_expression: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
        value_type: ValueType,
    ) -> Self {
        Self {
            path: path.into(),
            sub_expression: sub_expression.into(),
            operator,
            value: value.into(),
            value_type,
        }
    }
}

/// Delegation to a related resource reached via a registered mapper
///
/// The related instance is resolved through the mapper registered for
/// (current type → related type) and the nested container is evaluated
/// against it with the related type's own machinery, so nesting composes to
/// arbitrary depth. An absent relation is "not satisfied"; a missing mapper
/// registration is a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerCondition {
    /// Resource type the evaluation is delegated to
    pub related_resource_type: ResourceType,

    /// Conditions evaluated against the related instance
    pub related_conditions: ConditionContainer,
}

impl ContainerCondition {
    pub fn new(related_resource_type: ResourceType, related_conditions: ConditionContainer) -> Self {
        Self {
            related_resource_type,
            related_conditions,
        }
    }
}

/// Ordered AND-composition of conditions
///
/// Evaluation short-circuits on the first unsatisfied member; an empty
/// container is always satisfied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionContainer {
    #[serde(default)]
    pub conditions: Vec<PermissionCondition>,
}

impl ConditionContainer {
    /// Container with no conditions, satisfied by every instance
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(conditions: Vec<PermissionCondition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether the container can be decided without an instance
    pub fn is_satisfiable_without_instance(&self) -> bool {
        self.conditions.iter().all(|c| !c.requires_instance())
    }
}

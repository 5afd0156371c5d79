//! Query predicate tree compiled from permission conditions
//!
//! The predicate mirrors the condition tree in a backend-neutral shape the
//! data layer can translate into its query language. Expression predicates
//! carry the full extraction and comparison so backends that support
//! document push-down can translate them directly; a backend that cannot
//! push a given operator down is expected to post-filter loaded rows with
//! `AuthorizationSpecification::is_satisfied_by`.

use crate::condition::{Operator, ValueType};
use crate::types::ResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A compiled query-filtering predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryPredicate {
    /// Matches every row (empty condition container)
    Everything,

    /// Matches no row (no applicable permission)
    Nothing,

    /// Equality on a mapped storage path
    #[serde(rename_all = "camelCase")]
    Eq { path: String, value: Value },

    /// Comparison on a scalar extracted from a document field
    #[serde(rename_all = "camelCase")]
    Expression {
        path: String,
        sub_expression: String,
        operator: Operator,
        value: Value,
        value_type: ValueType,
    },

    /// Correlated predicate against a related resource type
    ///
    /// Rows match when the related instance reached through the registered
    /// mapping relation satisfies the inner predicate.
    #[serde(rename_all = "camelCase")]
    Related {
        resource_type: ResourceType,
        predicate: Box<QueryPredicate>,
    },

    /// Conjunction
    And(Vec<QueryPredicate>),

    /// Disjunction
    Or(Vec<QueryPredicate>),
}

impl QueryPredicate {
    /// Conjunction with trivial-case collapsing
    pub fn and(predicates: Vec<QueryPredicate>) -> QueryPredicate {
        let mut parts: Vec<QueryPredicate> = predicates
            .into_iter()
            .filter(|p| *p != QueryPredicate::Everything)
            .collect();

        if parts.iter().any(|p| *p == QueryPredicate::Nothing) {
            return QueryPredicate::Nothing;
        }
        match parts.len() {
            0 => QueryPredicate::Everything,
            1 => parts.remove(0),
            _ => QueryPredicate::And(parts),
        }
    }

    /// Disjunction with trivial-case collapsing
    pub fn or(predicates: Vec<QueryPredicate>) -> QueryPredicate {
        let mut parts: Vec<QueryPredicate> = predicates
            .into_iter()
            .filter(|p| *p != QueryPredicate::Nothing)
            .collect();

        if parts.iter().any(|p| *p == QueryPredicate::Everything) {
            return QueryPredicate::Everything;
        }
        match parts.len() {
            0 => QueryPredicate::Nothing,
            1 => parts.remove(0),
            _ => QueryPredicate::Or(parts),
        }
    }
}

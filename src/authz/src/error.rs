//! Error types for the authorization kernel

use crate::types::{Action, ResourceType};
use thiserror::Error;

/// Authorization kernel errors
///
/// `AccessDenied` is a denial outcome surfaced to the caller; the
/// configuration family is fatal and should be caught at deployment or
/// startup validation, before serving any decision. Neither is retried.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// No held-role permission grants access
    #[error("access denied: {action} on {resource_type} for principal '{principal}'")]
    AccessDenied {
        resource_type: ResourceType,
        action: Action,
        principal: String,
    },

    /// No specification factory registered for a resource type
    #[error("no specification factory registered for resource type '{0}'")]
    MissingFactory(ResourceType),

    /// No entity mapper registered for a container condition's type pair
    #[error("no entity mapper registered for '{from}' -> '{to}'")]
    MissingMapper { from: ResourceType, to: ResourceType },

    /// A condition references a field path the resource type does not declare
    #[error("unknown field path '{path}' on resource type '{resource_type}'")]
    UnknownField {
        resource_type: ResourceType,
        path: String,
    },

    /// Container conditions loop back through an already-visited resource type
    #[error("mapper cycle detected: {chain}")]
    MapperCycle { chain: String },

    /// Container recursion exceeded the configured depth cap
    #[error("container recursion exceeded maximum depth of {0}")]
    DepthExceeded(usize),

    /// A changeset id was redeployed with different content
    #[error("changeset '{changeset_id}' was redeployed with different content")]
    ChecksumMismatch { changeset_id: String },

    /// Deployment document failed validation
    #[error("invalid deployment: {0}")]
    InvalidDeployment(String),

    /// Evaluation failed for a reason other than "condition not satisfied"
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl AuthzError {
    /// Whether this error is a fatal configuration error
    ///
    /// Configuration errors indicate a bad deployment and must not be
    /// retried; they should never surface on a request path once deployment
    /// validation has passed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthzError::MissingFactory(_)
                | AuthzError::MissingMapper { .. }
                | AuthzError::UnknownField { .. }
                | AuthzError::MapperCycle { .. }
                | AuthzError::DepthExceeded(_)
        )
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

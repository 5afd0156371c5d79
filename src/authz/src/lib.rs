//! # Casework Authorization Kernel
//!
//! Role-based authorization engine for case-management resources.
//!
//! ## Features
//!
//! - **Allow-list decisions**: union across a principal's permissions,
//!   AND within each permission's condition container
//! - **Recursive condition language**: field, expression and container
//!   conditions as a closed tagged union, serde-deployable as JSON
//! - **Container delegation** across resource types through registered
//!   entity mappers, with cycle detection
//! - **Query-predicate compilation** so list endpoints filter with the same
//!   rules that guard single instances
//! - **Scoped privilege elevation** for trusted internal call paths, with
//!   guaranteed restoration on every exit path
//! - **Idempotent changeset deployment** with checksum verification
//!
//! ## Example
//!
//! ```no_run
//! use casework_authz::{
//!     Action, AuthorizationContext, AuthorizationService, AuthorizedResource, FieldAccessors,
//!     Principal, ResourceType,
//! };
//!
//! struct Document {
//!     status: String,
//! }
//!
//! impl AuthorizedResource for Document {
//!     fn resource_type() -> ResourceType {
//!         ResourceType::new("document")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AuthorizationService::builder()
//!         .register_resource::<Document>(
//!             FieldAccessors::new()
//!                 .field("status", |d: &Document| Some(serde_json::json!(d.status))),
//!         )
//!         .build();
//!
//!     let ctx = AuthorizationContext::new();
//!     let principal = Principal::new("user:anna").with_role("CASE_WORKER");
//!     let document = Document {
//!         status: "OPEN".to_string(),
//!     };
//!
//!     let allowed = service
//!         .is_authorized(&ctx, &principal, &Action::view(), &document)
//!         .await?;
//!     println!("allowed: {allowed}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod condition;
pub mod context;
pub mod deploy;
pub mod error;
pub mod mapper;
pub mod permission;
mod registry;
pub mod repository;
pub mod resource;
pub mod service;
pub mod specification;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheStats};
pub use condition::{
    ConditionContainer, ContainerCondition, ExpressionCondition, FieldCondition, Operator,
    PermissionCondition, ValueType,
};
pub use context::{AuthorizationContext, BypassGuard};
pub use deploy::{
    ChangesetDeployer, ChangesetRecord, DeployOutcome, PermissionChangeset, PermissionDefinition,
    RoleChangeset,
};
pub use error::{AuthzError, Result};
pub use mapper::AuthorizationEntityMapper;
pub use permission::{Permission, PermissionView};
pub use repository::{
    InMemoryPermissionRepository, InMemoryRoleRepository, PermissionRepository, RoleRepository,
};
pub use resource::{AuthorizedResource, FieldAccessors};
pub use service::{
    AuthorizationService, AuthorizationServiceBuilder, AvailabilityRequest, ServiceConfig,
};
pub use specification::{
    AuthorizationSpecification, AuthorizationSpecificationFactory, QueryPredicate,
};
pub use types::{Action, Principal, ResourceType, Role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

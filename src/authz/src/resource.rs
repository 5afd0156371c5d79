//! Resource registration and field access
//!
//! Dotted-path field resolution is an explicit accessor registry rather than
//! runtime reflection: each registered resource type declares the paths its
//! permissions may reference, mapped to typed accessor functions. Unknown
//! paths fail deployment validation instead of failing at some later
//! evaluation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::ResourceType;

/// A domain entity class that participates in authorization
///
/// Implemented by the owning domain crate; the kernel only ever sees the
/// token and the accessors registered for the type.
pub trait AuthorizedResource: Send + Sync + 'static {
    /// The resource-type token permissions reference
    fn resource_type() -> ResourceType;
}

type Accessor<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;

/// Registry of field accessors for one resource type
///
/// `Field` conditions resolve their `path` here; `Expression` conditions
/// resolve their `path` to the document value the sub-expression is applied
/// to. A resolved `None` means the instance has no value at that path (a
/// soft miss); a path absent from the registry is a configuration error.
pub struct FieldAccessors<T> {
    fields: HashMap<String, Accessor<T>>,
}

impl<T> FieldAccessors<T> {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Register an accessor for a dotted path
    pub fn field(
        mut self,
        path: impl Into<String>,
        accessor: impl Fn(&T) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.fields.insert(path.into(), Arc::new(accessor));
        self
    }

    /// Resolve a path against an instance
    ///
    /// Outer `None` = path not registered; inner `None` = no value on this
    /// instance.
    pub fn resolve(&self, path: &str, instance: &T) -> Option<Option<Value>> {
        self.fields.get(path).map(|accessor| accessor(instance))
    }

    /// Whether a path is registered
    pub fn declares(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    /// All registered paths
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> Default for FieldAccessors<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Document {
        status: String,
        assignee: Option<String>,
    }

    fn accessors() -> FieldAccessors<Document> {
        FieldAccessors::new()
            .field("status", |d: &Document| Some(json!(d.status)))
            .field("assigneeId", |d: &Document| {
                d.assignee.as_ref().map(|a| json!(a))
            })
    }

    #[test]
    fn test_resolve_registered_path() {
        let accessors = accessors();
        let doc = Document {
            status: "OPEN".to_string(),
            assignee: None,
        };

        assert_eq!(accessors.resolve("status", &doc), Some(Some(json!("OPEN"))));
        assert_eq!(accessors.resolve("assigneeId", &doc), Some(None));
        assert_eq!(accessors.resolve("owner", &doc), None);
    }

    #[test]
    fn test_declares() {
        let accessors = accessors();
        assert!(accessors.declares("status"));
        assert!(!accessors.declares("documentDefinitionId.name"));
        assert_eq!(accessors.len(), 2);
    }
}

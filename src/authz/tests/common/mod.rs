//! Shared case-management fixture domain for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use casework_authz::{
    AuthorizationEntityMapper, AuthorizationService, AuthorizedResource, FieldAccessors,
    ResourceType, Result, ServiceConfig,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Document {
    pub id: u64,
    pub definition_name: String,
    pub status: String,
    pub assignee: Option<String>,
    pub content: serde_json::Value,
}

impl Document {
    pub fn new(id: u64, definition_name: &str, status: &str) -> Self {
        Self {
            id,
            definition_name: definition_name.to_string(),
            status: status.to_string(),
            assignee: None,
            content: json!({}),
        }
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_assignee(mut self, assignee: &str) -> Self {
        self.assignee = Some(assignee.to_string());
        self
    }
}

impl AuthorizedResource for Document {
    fn resource_type() -> ResourceType {
        ResourceType::new("document")
    }
}

#[derive(Debug, Clone)]
pub struct Note {
    pub id: u64,
    pub document_id: Option<u64>,
    pub created_by: String,
}

impl Note {
    pub fn on_document(id: u64, document_id: u64) -> Self {
        Self {
            id,
            document_id: Some(document_id),
            created_by: "user:anna".to_string(),
        }
    }

    pub fn detached(id: u64) -> Self {
        Self {
            id,
            document_id: None,
            created_by: "user:anna".to_string(),
        }
    }
}

impl AuthorizedResource for Note {
    fn resource_type() -> ResourceType {
        ResourceType::new("note")
    }
}

/// Resolves the document a note was written on
pub struct NoteDocumentMapper {
    documents: Arc<HashMap<u64, Document>>,
}

#[async_trait]
impl AuthorizationEntityMapper<Note, Document> for NoteDocumentMapper {
    async fn map(&self, instance: &Note) -> Result<Option<Document>> {
        Ok(instance
            .document_id
            .and_then(|id| self.documents.get(&id).cloned()))
    }
}

pub fn document_accessors() -> FieldAccessors<Document> {
    FieldAccessors::new()
        .field("status", |d: &Document| Some(json!(d.status)))
        .field("documentDefinitionId.name", |d: &Document| {
            Some(json!(d.definition_name))
        })
        .field("assigneeId", |d: &Document| {
            d.assignee.as_ref().map(|a| json!(a))
        })
        .field("content", |d: &Document| Some(d.content.clone()))
}

pub fn note_accessors() -> FieldAccessors<Note> {
    FieldAccessors::new().field("createdBy", |n: &Note| Some(json!(n.created_by)))
}

/// Service over the fixture domain with the given document store
pub fn build_service(documents: Arc<HashMap<u64, Document>>) -> AuthorizationService {
    init_tracing();
    AuthorizationService::builder()
        .with_config(ServiceConfig::default())
        .register_resource::<Document>(document_accessors())
        .register_resource::<Note>(note_accessors())
        .register_mapper::<Note, Document, _>(NoteDocumentMapper { documents })
        .build()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

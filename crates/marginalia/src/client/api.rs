//! Annotation transport seam
//!
//! `AnnotationApi` is what an optimistic session talks to. Failures arrive
//! as the server's stable error body, never as a transport-specific type.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{AnnotationPatch, AnnotationView, NewAnnotation};
use crate::security::Role;
use crate::services::AnnotationStore;

#[async_trait]
pub trait AnnotationApi: Send + Sync {
    /// The role every call is made as
    fn role(&self) -> Role;

    async fn list(&self, document_id: &str) -> Result<Vec<AnnotationView>, ApiError>;

    async fn create(
        &self,
        document_id: &str,
        request: &NewAnnotation,
    ) -> Result<AnnotationView, ApiError>;

    async fn update(&self, id: &str, patch: &AnnotationPatch) -> Result<AnnotationView, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;
}

/// In-process transport straight onto an `AnnotationStore`
#[derive(Clone)]
pub struct DirectAnnotationApi {
    store: AnnotationStore,
    role: Role,
}

impl DirectAnnotationApi {
    pub fn new(store: AnnotationStore, role: Role) -> Self {
        Self { store, role }
    }
}

#[async_trait]
impl AnnotationApi for DirectAnnotationApi {
    fn role(&self) -> Role {
        self.role
    }

    async fn list(&self, document_id: &str) -> Result<Vec<AnnotationView>, ApiError> {
        self.store
            .list_visible_to(document_id, self.role)
            .await
            .map(|items| items.into_iter().map(AnnotationView::from).collect())
            .map_err(|e| e.to_api_error())
    }

    async fn create(
        &self,
        document_id: &str,
        request: &NewAnnotation,
    ) -> Result<AnnotationView, ApiError> {
        self.store
            .create(document_id, self.role, request.clone())
            .await
            .map(AnnotationView::from)
            .map_err(|e| e.to_api_error())
    }

    async fn update(&self, id: &str, patch: &AnnotationPatch) -> Result<AnnotationView, ApiError> {
        self.store
            .update(id, self.role, patch.clone())
            .await
            .map(AnnotationView::from)
            .map_err(|e| e.to_api_error())
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.store
            .delete(id, self.role)
            .await
            .map_err(|e| e.to_api_error())
    }
}

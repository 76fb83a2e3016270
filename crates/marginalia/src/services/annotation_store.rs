//! Annotation store service
//!
//! Enforces who may create, see, change and remove annotations. Admin may
//! read everything but has no write override: only the creator may update
//! or delete an annotation.

use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::error::{LibraryError, LibraryResult};
use crate::models::{normalize_visibility, Annotation, AnnotationKind, AnnotationPatch, NewAnnotation};
use crate::security::{require, require_owner, validate_annotation_payload, Capability, Role};
use crate::storage::Storage;

fn parse_annotation_id(id: &str) -> LibraryResult<ObjectId> {
    ObjectId::parse_str(id.trim()).map_err(|_| LibraryError::AnnotationNotFound(id.to_string()))
}

pub(crate) fn parse_document_id(id: &str) -> LibraryResult<ObjectId> {
    ObjectId::parse_str(id.trim()).map_err(|_| LibraryError::DocumentNotFound(id.to_string()))
}

#[derive(Clone)]
pub struct AnnotationStore {
    storage: Storage,
}

impl AnnotationStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    async fn require_document(&self, document_id: &str) -> LibraryResult<ObjectId> {
        let oid = parse_document_id(document_id)?;
        match self.storage.catalog.find(oid).await? {
            Some(_) => Ok(oid),
            None => Err(LibraryError::DocumentNotFound(document_id.to_string())),
        }
    }

    async fn find(&self, id: &str) -> LibraryResult<Annotation> {
        let oid = parse_annotation_id(id)?;
        self.storage
            .annotations
            .find(oid)
            .await?
            .ok_or_else(|| LibraryError::AnnotationNotFound(id.to_string()))
    }

    /// Create an annotation on an existing document
    pub async fn create(
        &self,
        document_id: &str,
        creator: Role,
        draft: NewAnnotation,
    ) -> LibraryResult<Annotation> {
        require(creator, Capability::Annotate, "create annotations")?;
        let document_oid = self.require_document(document_id).await?;

        let kind = draft
            .kind
            .as_deref()
            .ok_or_else(|| LibraryError::Validation("Annotation kind is required".to_string()))?
            .parse::<AnnotationKind>()
            .map_err(LibraryError::Validation)?;
        let payload = draft
            .payload
            .ok_or_else(|| LibraryError::Validation("Annotation payload is required".to_string()))?;
        validate_annotation_payload(&payload)?;

        let now = Utc::now();
        let annotation = Annotation {
            id: None,
            document_id: document_oid,
            created_by: creator,
            kind,
            payload,
            is_private: draft.is_private,
            visibility: normalize_visibility(creator, draft.visibility),
            created_at: now,
            updated_at: now,
        };
        let annotation = self.storage.annotations.insert(annotation).await?;
        tracing::info!(
            annotation = %annotation.id_hex(),
            document = %document_id,
            %creator,
            %kind,
            "annotation created"
        );
        Ok(annotation)
    }

    /// Annotations of a document the role may see, oldest first
    pub async fn list_visible_to(
        &self,
        document_id: &str,
        role: Role,
    ) -> LibraryResult<Vec<Annotation>> {
        let document_oid = self.require_document(document_id).await?;
        let all = self.storage.annotations.list_for_document(document_oid).await?;
        Ok(all.into_iter().filter(|a| a.is_visible_to(role)).collect())
    }

    /// One annotation, if the role may see it. An annotation the role may
    /// not see is reported as absent.
    pub async fn get_visible(&self, id: &str, role: Role) -> LibraryResult<Annotation> {
        let annotation = self.find(id).await?;
        if annotation.is_visible_to(role) {
            Ok(annotation)
        } else {
            Err(LibraryError::AnnotationNotFound(id.to_string()))
        }
    }

    /// Patch payload, privacy or visibility. Creator only.
    pub async fn update(
        &self,
        id: &str,
        requester: Role,
        patch: AnnotationPatch,
    ) -> LibraryResult<Annotation> {
        let current = self.find(id).await?;
        require_owner(requester, current.created_by, "update this annotation")?;

        if patch.is_empty() {
            return Err(LibraryError::Validation(
                "Update must change payload, isPrivate or visibility".to_string(),
            ));
        }
        if let Some(payload) = &patch.payload {
            validate_annotation_payload(payload)?;
        }
        let patch = AnnotationPatch {
            visibility: patch
                .visibility
                .map(|v| normalize_visibility(current.created_by, v)),
            ..patch
        };

        let updated = self
            .storage
            .annotations
            .update(parse_annotation_id(id)?, &patch, Utc::now())
            .await?
            .ok_or_else(|| LibraryError::AnnotationNotFound(id.to_string()))?;
        tracing::info!(annotation = %id, %requester, "annotation updated");
        Ok(updated)
    }

    /// Remove an annotation. Creator only.
    pub async fn delete(&self, id: &str, requester: Role) -> LibraryResult<()> {
        let current = self.find(id).await?;
        require_owner(requester, current.created_by, "delete this annotation")?;

        if !self.storage.annotations.remove(parse_annotation_id(id)?).await? {
            return Err(LibraryError::AnnotationNotFound(id.to_string()));
        }
        tracing::info!(annotation = %id, %requester, "annotation deleted");
        Ok(())
    }

    /// Remove every annotation of a document (document deletion cascade)
    pub async fn purge_document(&self, document_id: ObjectId) -> LibraryResult<u64> {
        let removed = self
            .storage
            .annotations
            .remove_for_document(document_id)
            .await?;
        if removed > 0 {
            tracing::info!(document = %document_id, removed, "annotations purged");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlobRef, FileRecord, StoredBlob};
    use crate::storage::MemoryStorage;
    use serde_json::json;

    async fn setup() -> (AnnotationStore, String) {
        let memory = MemoryStorage::new();
        let storage = memory.storage();
        let blob = StoredBlob {
            blob_ref: BlobRef::new(),
            size: 4,
            sha256: String::new(),
        };
        let record = storage
            .catalog
            .insert(FileRecord::new("doc.pdf".into(), Role::Admin, "application/pdf", &blob))
            .await
            .unwrap();
        (AnnotationStore::new(storage), record.id_hex())
    }

    fn draft(is_private: bool, visibility: Vec<Role>) -> NewAnnotation {
        NewAnnotation {
            kind: Some("Highlight".into()),
            payload: Some(json!({"page": 1, "rects": [[10, 10, 80, 12]]})),
            is_private,
            visibility,
        }
    }

    fn ids(items: &[Annotation]) -> Vec<String> {
        items.iter().map(Annotation::id_hex).collect()
    }

    #[tokio::test]
    async fn test_private_annotation_hidden_from_other_roles() {
        let (store, doc) = setup().await;
        let a = store.create(&doc, Role::DoerA, draft(true, vec![Role::Reader])).await.unwrap();

        for role in Role::ALL {
            let visible = store.list_visible_to(&doc, role).await.unwrap();
            let expected = matches!(role, Role::DoerA | Role::Admin);
            assert_eq!(visible.iter().any(|v| v.id == a.id), expected, "role {}", role);
        }
    }

    #[tokio::test]
    async fn test_shared_annotation_visible_to_listed_roles() {
        let (store, doc) = setup().await;
        let a = store.create(&doc, Role::DoerB, draft(false, vec![Role::Reader])).await.unwrap();

        for role in Role::ALL {
            let visible = store.list_visible_to(&doc, role).await.unwrap();
            let expected = matches!(role, Role::DoerB | Role::Reader | Role::Admin);
            assert_eq!(visible.iter().any(|v| v.id == a.id), expected, "role {}", role);
        }
    }

    #[tokio::test]
    async fn test_reader_cannot_create_but_can_list() {
        let (store, doc) = setup().await;
        let err = store.create(&doc, Role::Reader, draft(false, vec![])).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap();
        let shared = store.create(&doc, Role::DoerA, draft(false, vec![Role::Reader])).await.unwrap();
        store.create(&doc, Role::DoerB, draft(false, vec![Role::DoerA])).await.unwrap();

        let visible = store.list_visible_to(&doc, Role::Reader).await.unwrap();
        assert_eq!(ids(&visible), vec![shared.id_hex()]);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_creation() {
        let (store, doc) = setup().await;
        let mut created = Vec::new();
        for _ in 0..3 {
            created.push(store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap());
        }
        let listed = store.list_visible_to(&doc, Role::DoerA).await.unwrap();
        assert_eq!(ids(&listed), ids(&created));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (store, doc) = setup().await;

        let mut bad_kind = draft(true, vec![]);
        bad_kind.kind = Some("Sticker".into());
        assert_eq!(store.create(&doc, Role::DoerA, bad_kind).await.unwrap_err().code(), "VALIDATION_ERROR");

        let mut no_payload = draft(true, vec![]);
        no_payload.payload = None;
        assert_eq!(store.create(&doc, Role::DoerA, no_payload).await.unwrap_err().code(), "VALIDATION_ERROR");

        let mut page_zero = draft(true, vec![]);
        page_zero.payload = Some(json!({"page": 0}));
        assert_eq!(store.create(&doc, Role::DoerA, page_zero).await.unwrap_err().code(), "VALIDATION_ERROR");

        let missing = ObjectId::new().to_hex();
        assert_eq!(
            store.create(&missing, Role::DoerA, draft(true, vec![])).await.unwrap_err().code(),
            "DOCUMENT_NOT_FOUND"
        );
        assert_eq!(
            store.list_visible_to("not-an-id", Role::Admin).await.unwrap_err().code(),
            "DOCUMENT_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_creator_is_dropped_from_visibility() {
        let (store, doc) = setup().await;
        let a = store
            .create(&doc, Role::DoerA, draft(false, vec![Role::DoerA, Role::Reader, Role::Reader]))
            .await
            .unwrap();
        assert_eq!(a.visibility, vec![Role::Reader]);
    }

    #[tokio::test]
    async fn test_admin_has_read_override_but_no_write_override() {
        let (store, doc) = setup().await;
        let a = store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap();
        let id = a.id_hex();

        // Admin sees the private annotation...
        assert!(store.get_visible(&id, Role::Admin).await.is_ok());

        // ...but may neither change nor remove it.
        let patch = AnnotationPatch {
            is_private: Some(false),
            ..AnnotationPatch::default()
        };
        assert_eq!(store.update(&id, Role::Admin, patch.clone()).await.unwrap_err().code(), "FORBIDDEN");
        assert_eq!(store.delete(&id, Role::Admin).await.unwrap_err().code(), "FORBIDDEN");
        assert_eq!(store.update(&id, Role::DoerB, patch).await.unwrap_err().code(), "FORBIDDEN");
        assert_eq!(store.delete(&id, Role::Reader).await.unwrap_err().code(), "FORBIDDEN");

        // Still intact.
        let unchanged = store.get_visible(&id, Role::DoerA).await.unwrap();
        assert!(unchanged.is_private);
    }

    #[tokio::test]
    async fn test_creator_update_and_delete() {
        let (store, doc) = setup().await;
        let a = store.create(&doc, Role::DoerB, draft(true, vec![])).await.unwrap();
        let id = a.id_hex();

        let updated = store
            .update(
                &id,
                Role::DoerB,
                AnnotationPatch {
                    payload: Some(json!({"page": 4, "text": "moved"})),
                    is_private: Some(false),
                    visibility: Some(vec![Role::DoerB, Role::DoerA]),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.payload["page"], 4);
        assert_eq!(updated.visibility, vec![Role::DoerA]);
        assert_eq!(updated.created_at, a.created_at);
        assert!(updated.updated_at >= a.updated_at);
        assert!(store.get_visible(&id, Role::DoerA).await.is_ok());

        store.delete(&id, Role::DoerB).await.unwrap();
        assert_eq!(store.get_visible(&id, Role::DoerB).await.unwrap_err().code(), "ANNOTATION_NOT_FOUND");
        assert_eq!(store.delete(&id, Role::DoerB).await.unwrap_err().code(), "ANNOTATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_rejects_empty_patch_and_bad_payload() {
        let (store, doc) = setup().await;
        let id = store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap().id_hex();

        let err = store.update(&id, Role::DoerA, AnnotationPatch::default()).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let bad = AnnotationPatch {
            payload: Some(json!("not an object")),
            ..AnnotationPatch::default()
        };
        assert_eq!(store.update(&id, Role::DoerA, bad).await.unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(
            store.update("nope", Role::DoerA, AnnotationPatch::default()).await.unwrap_err().code(),
            "ANNOTATION_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_invisible_annotation_reads_as_not_found() {
        let (store, doc) = setup().await;
        let id = store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap().id_hex();
        let err = store.get_visible(&id, Role::DoerB).await.unwrap_err();
        assert_eq!(err.code(), "ANNOTATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_purge_document() {
        let (store, doc) = setup().await;
        store.create(&doc, Role::DoerA, draft(true, vec![])).await.unwrap();
        store.create(&doc, Role::DoerB, draft(true, vec![])).await.unwrap();
        let removed = store.purge_document(parse_document_id(&doc).unwrap()).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.list_visible_to(&doc, Role::Admin).await.unwrap().is_empty());
    }
}

//! File catalog service
//!
//! Owns document records and their lifecycle: single and bulk upload,
//! listing, lookup and cascade deletion. Record and blob live in separate
//! stores with no shared transaction, so multi-step operations compensate
//! or log instead of rolling back.

use axum::body::Bytes;
use futures::Stream;

use super::annotation_store::parse_document_id;
use super::{AnnotationStore, BlobStore};
use crate::config::LibraryConfig;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{BatchReport, FileOutcome, FileRecord, StoredBlob};
use crate::security::{require, validate_file_name, Capability, Role};
use crate::storage::Storage;

#[derive(Clone)]
pub struct FileCatalog {
    storage: Storage,
    blobs: BlobStore,
    annotations: AnnotationStore,
    config: LibraryConfig,
}

impl FileCatalog {
    pub fn new(storage: Storage, config: LibraryConfig) -> Self {
        Self {
            blobs: BlobStore::new(storage.blobs.clone(), &config),
            annotations: AnnotationStore::new(storage.clone()),
            storage,
            config,
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Record an already stored blob in the catalog
    pub async fn create(
        &self,
        name: &str,
        uploader: Role,
        content_type: &str,
        blob: &StoredBlob,
    ) -> LibraryResult<FileRecord> {
        let file_name = validate_file_name(name)?;
        let record = FileRecord::new(file_name, uploader, content_type, blob);
        self.storage.catalog.insert(record).await
    }

    /// All documents, most recent upload first
    pub async fn list(&self) -> LibraryResult<Vec<FileRecord>> {
        self.storage.catalog.list_newest_first().await
    }

    pub async fn get_by_id(&self, id: &str) -> LibraryResult<FileRecord> {
        let oid = parse_document_id(id)?;
        self.storage
            .catalog
            .find(oid)
            .await?
            .ok_or_else(|| LibraryError::DocumentNotFound(id.to_string()))
    }

    /// Validate, store the bytes, then record the document. If the record
    /// cannot be written the blob is removed again.
    pub async fn upload<S>(
        &self,
        caller: Role,
        name: &str,
        content_type: &str,
        chunks: S,
    ) -> LibraryResult<FileRecord>
    where
        S: Stream<Item = LibraryResult<Bytes>> + Send,
    {
        require(caller, Capability::ManageCatalog, "upload documents")?;
        self.store_one(caller, name, content_type, chunks).await
    }

    async fn store_one<S>(
        &self,
        caller: Role,
        name: &str,
        content_type: &str,
        chunks: S,
    ) -> LibraryResult<FileRecord>
    where
        S: Stream<Item = LibraryResult<Bytes>> + Send,
    {
        let file_name = validate_file_name(name)?;
        let stored = self.blobs.put(&file_name, content_type, chunks).await?;

        match self.create(&file_name, caller, content_type, &stored).await {
            Ok(record) => {
                tracing::info!(
                    document = %record.id_hex(),
                    file_name = %record.file_name,
                    size = stored.size,
                    "document uploaded"
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(stored.blob_ref).await {
                    tracing::warn!(
                        blob = %stored.blob_ref,
                        "orphan blob: record insert failed and blob delete failed: {}",
                        cleanup
                    );
                }
                Err(LibraryError::StorageWriteFailed(format!(
                    "failed to record '{}': {}",
                    file_name, e
                )))
            }
        }
    }

    /// Start a bulk upload. The capability check happens once, up front.
    pub fn begin_batch(&self, caller: Role) -> LibraryResult<BatchUpload<'_>> {
        require(caller, Capability::ManageCatalog, "upload documents")?;
        Ok(BatchUpload {
            catalog: self,
            caller,
            outcomes: Vec::new(),
        })
    }

    /// Delete a document: record first, then blob, then annotations. Once
    /// the record is gone the document is gone; later failures are logged.
    pub async fn delete_by_id(&self, caller: Role, id: &str) -> LibraryResult<FileRecord> {
        require(caller, Capability::ManageCatalog, "delete documents")?;
        let record = self.get_by_id(id).await?;
        let oid = parse_document_id(id)?;

        let removed = self
            .storage
            .catalog
            .remove(oid)
            .await
            .map_err(|e| LibraryError::StorageWriteFailed(format!("failed to delete record: {}", e)))?;
        if !removed {
            return Err(LibraryError::DocumentNotFound(id.to_string()));
        }

        if let Err(e) = self.blobs.delete(record.blob_id).await {
            tracing::warn!(
                document = %id,
                blob = %record.blob_id,
                "orphan blob: record deleted but blob delete failed: {}",
                e
            );
        }
        if let Err(e) = self.annotations.purge_document(oid).await {
            tracing::warn!(document = %id, "failed to purge annotations: {}", e);
        }

        tracing::info!(document = %id, file_name = %record.file_name, "document deleted");
        Ok(record)
    }
}

/// One bulk upload in progress. Files are stored one at a time in the
/// order they are pushed, so outcomes keep submission order.
pub struct BatchUpload<'a> {
    catalog: &'a FileCatalog,
    caller: Role,
    outcomes: Vec<FileOutcome>,
}

impl BatchUpload<'_> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() >= self.catalog.config.max_batch_files
    }

    /// Store one file and record its outcome. Files past the batch limit
    /// are rejected without reading their content.
    pub async fn push<S>(&mut self, name: &str, content_type: &str, chunks: S) -> &FileOutcome
    where
        S: Stream<Item = LibraryResult<Bytes>> + Send,
    {
        let result = if self.is_full() {
            Err(LibraryError::Validation(format!(
                "at most {} files per bulk upload",
                self.catalog.config.max_batch_files
            )))
        } else {
            self.catalog
                .store_one(self.caller, name, content_type, chunks)
                .await
        };
        self.record(name, result)
    }

    fn record(&mut self, name: &str, result: LibraryResult<FileRecord>) -> &FileOutcome {
        let outcome = match result {
            Ok(record) => FileOutcome::Succeeded {
                file_name: record.file_name.clone(),
                document: record.into(),
            },
            Err(e) => {
                tracing::debug!(file_name = %name, "bulk upload file rejected: {}", e);
                FileOutcome::Rejected {
                    file_name: name.to_string(),
                    error: e.to_api_error(),
                }
            }
        };
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    pub fn finish(self) -> BatchReport {
        let report = BatchReport::from_outcomes(self.outcomes);
        tracing::info!(
            succeeded = report.succeeded,
            rejected = report.rejected,
            "bulk upload finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, NewAnnotation};
    use crate::storage::MemoryStorage;
    use futures::{stream, StreamExt};
    use serde_json::json;

    const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF";

    fn chunks(data: &'static [u8]) -> impl Stream<Item = LibraryResult<Bytes>> + Send {
        stream::iter(data.chunks(7).map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>())
    }

    fn setup() -> (MemoryStorage, FileCatalog) {
        let memory = MemoryStorage::new();
        let config = LibraryConfig {
            max_file_size: 64,
            max_batch_files: 3,
            ..LibraryConfig::default()
        };
        let catalog = FileCatalog::new(memory.storage(), config);
        (memory, catalog)
    }

    async fn read_blob(catalog: &FileCatalog, record: &FileRecord) -> LibraryResult<Vec<u8>> {
        let mut reader = catalog.blobs().get(record.blob_id).await?;
        let mut out = Vec::new();
        while let Some(chunk) = reader.next().await {
            out.extend_from_slice(&chunk.map_err(|e| LibraryError::Internal(e.to_string()))?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_upload_round_trips_bytes() {
        let (_, catalog) = setup();
        let record = catalog
            .upload(Role::Admin, "paper.pdf", "application/pdf", chunks(PDF))
            .await
            .unwrap();
        assert_eq!(record.file_name, "paper.pdf");
        assert_eq!(record.uploader_role, Role::Admin);
        assert_eq!(record.file_size, PDF.len() as i64);

        let fetched = catalog.get_by_id(&record.id_hex()).await.unwrap();
        assert_eq!(fetched, record);
        assert_eq!(read_blob(&catalog, &fetched).await.unwrap(), PDF);
    }

    #[tokio::test]
    async fn test_only_admin_manages_catalog() {
        let (memory, catalog) = setup();
        for role in [Role::DoerA, Role::DoerB, Role::Reader] {
            let err = catalog
                .upload(role, "x.pdf", "application/pdf", chunks(PDF))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "FORBIDDEN");
            assert!(catalog.begin_batch(role).is_err());
        }
        assert!(memory.blobs.is_empty().await);

        let record = catalog
            .upload(Role::Admin, "x.pdf", "application/pdf", chunks(PDF))
            .await
            .unwrap();
        let err = catalog.delete_by_id(Role::DoerA, &record.id_hex()).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert!(catalog.get_by_id(&record.id_hex()).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_payload_creates_no_record() {
        let (memory, catalog) = setup();
        let err = catalog
            .upload(Role::Admin, "notes.txt", "text/plain", chunks(b"hello"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_REJECTED");

        let oversized: &'static [u8] = &[b'x'; 65];
        let err = catalog
            .upload(Role::Admin, "big.pdf", "application/pdf", chunks(oversized))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_REJECTED");

        assert!(catalog.list().await.unwrap().is_empty());
        assert!(memory.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_storing() {
        let (memory, catalog) = setup();
        let err = catalog
            .upload(Role::Admin, "   ", "application/pdf", chunks(PDF))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(memory.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_blob() {
        let (memory, catalog) = setup();
        memory.catalog.fail_inserts(true);
        let err = catalog
            .upload(Role::Admin, "a.pdf", "application/pdf", chunks(PDF))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_WRITE_FAILED");
        assert!(memory.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_, catalog) = setup();
        let first = catalog.upload(Role::Admin, "1.pdf", "application/pdf", chunks(PDF)).await.unwrap();
        let second = catalog.upload(Role::Admin, "2.pdf", "application/pdf", chunks(PDF)).await.unwrap();
        let listed: Vec<_> = catalog.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_get_unknown_or_malformed_id() {
        let (_, catalog) = setup();
        assert_eq!(catalog.get_by_id("zzz").await.unwrap_err().code(), "DOCUMENT_NOT_FOUND");
        let missing = mongodb::bson::oid::ObjectId::new().to_hex();
        assert_eq!(catalog.get_by_id(&missing).await.unwrap_err().code(), "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_cascades_to_blob_and_annotations() {
        let (memory, catalog) = setup();
        let record = catalog.upload(Role::Admin, "a.pdf", "application/pdf", chunks(PDF)).await.unwrap();
        let id = record.id_hex();
        let annotations = AnnotationStore::new(memory.storage());
        annotations
            .create(
                &id,
                Role::DoerA,
                NewAnnotation {
                    kind: Some("Comment".into()),
                    payload: Some(json!({"page": 1, "text": "typo"})),
                    is_private: false,
                    visibility: vec![Role::Reader],
                },
            )
            .await
            .unwrap();

        catalog.delete_by_id(Role::Admin, &id).await.unwrap();

        assert!(catalog.list().await.unwrap().is_empty());
        assert_eq!(catalog.get_by_id(&id).await.unwrap_err().code(), "DOCUMENT_NOT_FOUND");
        assert_eq!(read_blob(&catalog, &record).await.unwrap_err().code(), "BLOB_NOT_FOUND");
        assert_eq!(
            annotations.list_visible_to(&id, Role::Admin).await.unwrap_err().code(),
            "DOCUMENT_NOT_FOUND"
        );
        assert!(memory.annotations.is_empty().await);
        assert_eq!(catalog.delete_by_id(Role::Admin, &id).await.unwrap_err().code(), "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_survives_blob_failure() {
        let (memory, catalog) = setup();
        let record = catalog.upload(Role::Admin, "a.pdf", "application/pdf", chunks(PDF)).await.unwrap();
        memory.blobs.fail_removals(true);

        catalog.delete_by_id(Role::Admin, &record.id_hex()).await.unwrap();
        assert!(catalog.list().await.unwrap().is_empty());
        // Orphaned, but logged rather than surfaced
        assert!(memory.blobs.contains(record.blob_id).await);
    }

    #[tokio::test]
    async fn test_delete_record_failure_removes_nothing() {
        let (memory, catalog) = setup();
        let record = catalog.upload(Role::Admin, "a.pdf", "application/pdf", chunks(PDF)).await.unwrap();
        memory.catalog.fail_removals(true);

        let err = catalog.delete_by_id(Role::Admin, &record.id_hex()).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_WRITE_FAILED");
        assert!(memory.blobs.contains(record.blob_id).await);
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_upload_keeps_submission_order() {
        let (_, catalog) = setup();
        let mut batch = catalog.begin_batch(Role::Admin).unwrap();
        batch.push("one.pdf", "application/pdf", chunks(PDF)).await;
        batch.push("two.txt", "text/plain", chunks(b"plain")).await;
        batch.push("three.pdf", "application/pdf", chunks(PDF)).await;
        let report = batch.finish();

        let statuses: Vec<_> = report.outcomes.iter().map(|o| (o.file_name().to_string(), o.is_success())).collect();
        assert_eq!(
            statuses,
            vec![
                ("one.pdf".to_string(), true),
                ("two.txt".to_string(), false),
                ("three.pdf".to_string(), true),
            ]
        );
        assert_eq!(report.status, BatchStatus::Partial);
        assert!(report.partial_failure().is_some());
        assert_eq!(catalog.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_upload_rejects_files_past_limit() {
        let (memory, catalog) = setup();
        let mut batch = catalog.begin_batch(Role::Admin).unwrap();
        for i in 0..4 {
            batch.push(&format!("{}.pdf", i), "application/pdf", chunks(PDF)).await;
        }
        let report = batch.finish();

        assert_eq!((report.succeeded, report.rejected), (3, 1));
        match &report.outcomes[3] {
            FileOutcome::Rejected { file_name, error } => {
                assert_eq!(file_name, "3.pdf");
                assert_eq!(error.code, "VALIDATION_ERROR");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(memory.blobs.len().await, 3);
    }

    #[tokio::test]
    async fn test_bulk_upload_all_rejected() {
        let (_, catalog) = setup();
        let mut batch = catalog.begin_batch(Role::Admin).unwrap();
        let interrupted = stream::iter(vec![
            Ok(Bytes::from_static(b"%PDF-1.7\n")),
            Err(LibraryError::StorageWriteFailed("stream reset".into())),
        ]);
        batch.push("broken.pdf", "application/pdf", interrupted).await;
        batch.push("a.doc", "application/msword", chunks(b"doc")).await;
        let report = batch.finish();
        assert_eq!(report.status, BatchStatus::Failed);
        assert!(catalog.list().await.unwrap().is_empty());
    }
}

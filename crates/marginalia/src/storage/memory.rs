//! In-process storage backend
//!
//! Backs tests and database-less local runs. Each store can be told to fail
//! specific operations so that partial-failure paths can be exercised.

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    AnnotationRepository, BlobBackend, BlobReader, ByteStream, CatalogRepository, Storage,
};
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Annotation, AnnotationPatch, BlobRef, FileRecord};

fn injected(op: &str) -> LibraryError {
    LibraryError::Database(format!("injected failure: {}", op))
}

/// Document records held in memory
#[derive(Default)]
pub struct MemoryCatalog {
    records: RwLock<Vec<FileRecord>>,
    fail_insert: AtomicBool,
    fail_remove: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn insert(&self, mut record: FileRecord) -> LibraryResult<FileRecord> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(injected("catalog insert"));
        }
        record.id = Some(ObjectId::new());
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<FileRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == Some(id)).cloned())
    }

    async fn list_newest_first(&self) -> LibraryResult<Vec<FileRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.upload_date.cmp(&a.upload_date).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn remove(&self, id: ObjectId) -> LibraryResult<bool> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(injected("catalog remove"));
        }
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != Some(id));
        Ok(records.len() != before)
    }
}

/// Annotation records held in memory
#[derive(Default)]
pub struct MemoryAnnotations {
    records: RwLock<HashMap<ObjectId, Annotation>>,
}

impl MemoryAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AnnotationRepository for MemoryAnnotations {
    async fn insert(&self, mut annotation: Annotation) -> LibraryResult<Annotation> {
        let id = ObjectId::new();
        annotation.id = Some(id);
        self.records.write().await.insert(id, annotation.clone());
        Ok(annotation)
    }

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<Annotation>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_for_document(&self, document_id: ObjectId) -> LibraryResult<Vec<Annotation>> {
        let mut items: Vec<Annotation> = self
            .records
            .read()
            .await
            .values()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn update(
        &self,
        id: ObjectId,
        patch: &AnnotationPatch,
        now: DateTime<Utc>,
    ) -> LibraryResult<Option<Annotation>> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|a| {
            patch.apply(a, now);
            a.clone()
        }))
    }

    async fn remove(&self, id: ObjectId) -> LibraryResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn remove_for_document(&self, document_id: ObjectId) -> LibraryResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, a| a.document_id != document_id);
        Ok((before - records.len()) as u64)
    }
}

/// Blobs held in memory; a blob becomes visible only once fully received
#[derive(Default)]
pub struct MemoryBlobs {
    blobs: RwLock<HashMap<BlobRef, Bytes>>,
    fail_write: AtomicBool,
    fail_remove: AtomicBool,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, blob: BlobRef) -> bool {
        self.blobs.read().await.contains_key(&blob)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobs {
    async fn write(
        &self,
        _file_name: &str,
        _content_type: &str,
        mut chunks: ByteStream<'_>,
    ) -> LibraryResult<BlobRef> {
        let mut buffer = Vec::new();
        while let Some(chunk) = chunks.next().await {
            buffer.extend_from_slice(&chunk?);
            if self.fail_write.load(Ordering::SeqCst) {
                return Err(LibraryError::StorageWriteFailed(
                    "injected failure: blob write".to_string(),
                ));
            }
        }
        let blob = BlobRef::new();
        self.blobs.write().await.insert(blob, Bytes::from(buffer));
        Ok(blob)
    }

    async fn open(&self, blob: BlobRef) -> LibraryResult<BlobReader> {
        let bytes = self
            .blobs
            .read()
            .await
            .get(&blob)
            .cloned()
            .ok_or_else(|| LibraryError::BlobNotFound(blob.to_hex()))?;
        Ok(futures::stream::once(async move { Ok(bytes) }).boxed())
    }

    async fn remove(&self, blob: BlobRef) -> LibraryResult<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(injected("blob remove"));
        }
        self.blobs.write().await.remove(&blob);
        Ok(())
    }
}

/// Concrete handles to the memory stores, kept for inspection and fault
/// injection while `storage()` hands the trait objects to services.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub catalog: Arc<MemoryCatalog>,
    pub annotations: Arc<MemoryAnnotations>,
    pub blobs: Arc<MemoryBlobs>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage(&self) -> Storage {
        Storage::new(
            self.catalog.clone(),
            self.annotations.clone(),
            self.blobs.clone(),
            "memory",
        )
    }
}

//! Persistence substrate
//!
//! Services talk to three narrow contracts: a catalog of document records,
//! an annotation record store, and a blob store. Every record write is a
//! single-record atomic operation; nothing here spans records.
//!
//! Two implementations ship: MongoDB (collections + GridFS) and an
//! in-process memory backend.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::error::LibraryResult;
use crate::models::{Annotation, AnnotationPatch, BlobRef, FileRecord};

pub use memory::{MemoryAnnotations, MemoryBlobs, MemoryCatalog, MemoryStorage};
pub use mongo::{GridFsBlobStore, MongoAnnotations, MongoCatalog};

/// Incoming blob content. An `Err` item aborts the write with that error.
pub type ByteStream<'a> = BoxStream<'a, LibraryResult<Bytes>>;

/// Outgoing blob content
pub type BlobReader = BoxStream<'static, std::io::Result<Bytes>>;

/// Document record store
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert a record and return it with its assigned id
    async fn insert(&self, record: FileRecord) -> LibraryResult<FileRecord>;

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<FileRecord>>;

    /// All records, most recent upload first
    async fn list_newest_first(&self) -> LibraryResult<Vec<FileRecord>>;

    /// Returns whether a record was removed
    async fn remove(&self, id: ObjectId) -> LibraryResult<bool>;
}

/// Annotation record store
#[async_trait]
pub trait AnnotationRepository: Send + Sync {
    async fn insert(&self, annotation: Annotation) -> LibraryResult<Annotation>;

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<Annotation>>;

    /// Annotations of one document, oldest first (ties broken by id)
    async fn list_for_document(&self, document_id: ObjectId) -> LibraryResult<Vec<Annotation>>;

    /// Apply the mutable fields of `patch` atomically; `None` if the record is gone
    async fn update(
        &self,
        id: ObjectId,
        patch: &AnnotationPatch,
        now: chrono::DateTime<chrono::Utc>,
    ) -> LibraryResult<Option<Annotation>>;

    async fn remove(&self, id: ObjectId) -> LibraryResult<bool>;

    /// Remove every annotation of a document, returning how many went
    async fn remove_for_document(&self, document_id: ObjectId) -> LibraryResult<u64>;
}

/// Binary blob store
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Commit the whole stream as one blob. If the stream yields an error or
    /// the write fails, nothing written so far stays reachable.
    async fn write(
        &self,
        file_name: &str,
        content_type: &str,
        chunks: ByteStream<'_>,
    ) -> LibraryResult<BlobRef>;

    /// Full read of a blob; `BlobNotFound` for unknown references
    async fn open(&self, blob: BlobRef) -> LibraryResult<BlobReader>;

    /// Idempotent: removing an absent blob succeeds
    async fn remove(&self, blob: BlobRef) -> LibraryResult<()>;
}

/// The substrate handles shared by every service
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub annotations: Arc<dyn AnnotationRepository>,
    pub blobs: Arc<dyn BlobBackend>,
    backend: &'static str,
}

impl Storage {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        annotations: Arc<dyn AnnotationRepository>,
        blobs: Arc<dyn BlobBackend>,
        backend: &'static str,
    ) -> Self {
        Self {
            catalog,
            annotations,
            blobs,
            backend,
        }
    }

    /// MongoDB collections for records, a GridFS bucket for blobs
    pub fn mongo(db: &crate::db::MongoDb, bucket: &str) -> Self {
        Self::new(
            Arc::new(MongoCatalog::new(db)),
            Arc::new(MongoAnnotations::new(db)),
            Arc::new(GridFsBlobStore::new(db, bucket)),
            "mongodb",
        )
    }

    /// Fresh, empty in-process storage
    pub fn in_memory() -> Self {
        MemoryStorage::new().storage()
    }

    /// Backend name for health reporting
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

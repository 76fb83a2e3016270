//! MongoDB storage backend
//!
//! Catalog records live in `files`, annotations in `annotations`, and blob
//! bytes in a GridFS bucket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::AsyncWriteExt;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, GridFsErrorKind};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, GridFsBucketOptions, GridFsUploadOptions,
    ReturnDocument,
};
use mongodb::Collection;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;

use super::{AnnotationRepository, BlobBackend, BlobReader, ByteStream, CatalogRepository};
use crate::db::{collections, MongoDb};
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Annotation, AnnotationPatch, BlobRef, FileRecord};

fn inserted_id(id: Bson) -> LibraryResult<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| LibraryError::Internal("inserted id is not an ObjectId".to_string()))
}

fn is_file_not_found(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::GridFs { 0: GridFsErrorKind::FileNotFound { .. }, .. }
    )
}

/// Catalog records in the `files` collection
pub struct MongoCatalog {
    files: Collection<FileRecord>,
}

impl MongoCatalog {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            files: db.collection(collections::FILES),
        }
    }
}

#[async_trait]
impl CatalogRepository for MongoCatalog {
    async fn insert(&self, mut record: FileRecord) -> LibraryResult<FileRecord> {
        let result = self.files.insert_one(&record, None).await?;
        record.id = Some(inserted_id(result.inserted_id)?);
        Ok(record)
    }

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<FileRecord>> {
        Ok(self.files.find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_newest_first(&self) -> LibraryResult<Vec<FileRecord>> {
        let options = FindOptions::builder()
            .sort(doc! { "upload_date": -1, "_id": -1 })
            .build();
        let cursor = self.files.find(None, options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn remove(&self, id: ObjectId) -> LibraryResult<bool> {
        let result = self.files.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

/// Annotation records in the `annotations` collection
pub struct MongoAnnotations {
    annotations: Collection<Annotation>,
}

impl MongoAnnotations {
    pub fn new(db: &MongoDb) -> Self {
        Self {
            annotations: db.collection(collections::ANNOTATIONS),
        }
    }
}

/// `$set` document for a patch. Visibility is written as given; callers
/// pass an already normalized set.
fn patch_update(patch: &AnnotationPatch, now: DateTime<Utc>) -> LibraryResult<Document> {
    let mut set = doc! { "updated_at": bson::DateTime::from_chrono(now) };
    if let Some(payload) = &patch.payload {
        set.insert("payload", bson::to_bson(payload)?);
    }
    if let Some(is_private) = patch.is_private {
        set.insert("is_private", is_private);
    }
    if let Some(visibility) = &patch.visibility {
        set.insert("visibility", bson::to_bson(visibility)?);
    }
    Ok(doc! { "$set": set })
}

#[async_trait]
impl AnnotationRepository for MongoAnnotations {
    async fn insert(&self, mut annotation: Annotation) -> LibraryResult<Annotation> {
        let result = self.annotations.insert_one(&annotation, None).await?;
        annotation.id = Some(inserted_id(result.inserted_id)?);
        Ok(annotation)
    }

    async fn find(&self, id: ObjectId) -> LibraryResult<Option<Annotation>> {
        Ok(self.annotations.find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_for_document(&self, document_id: ObjectId) -> LibraryResult<Vec<Annotation>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let cursor = self
            .annotations
            .find(doc! { "document_id": document_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(
        &self,
        id: ObjectId,
        patch: &AnnotationPatch,
        now: DateTime<Utc>,
    ) -> LibraryResult<Option<Annotation>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .annotations
            .find_one_and_update(doc! { "_id": id }, patch_update(patch, now)?, options)
            .await?)
    }

    async fn remove(&self, id: ObjectId) -> LibraryResult<bool> {
        let result = self.annotations.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn remove_for_document(&self, document_id: ObjectId) -> LibraryResult<u64> {
        let result = self
            .annotations
            .delete_many(doc! { "document_id": document_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

/// Blob bytes in a GridFS bucket
pub struct GridFsBlobStore {
    bucket: GridFsBucket,
}

impl GridFsBlobStore {
    pub fn new(db: &MongoDb, bucket_name: &str) -> Self {
        let options = GridFsBucketOptions::builder()
            .bucket_name(bucket_name.to_string())
            .build();
        Self {
            bucket: db.db().gridfs_bucket(options),
        }
    }
}

#[async_trait]
impl BlobBackend for GridFsBlobStore {
    async fn write(
        &self,
        file_name: &str,
        content_type: &str,
        mut chunks: ByteStream<'_>,
    ) -> LibraryResult<BlobRef> {
        let blob = BlobRef::new();
        let options = GridFsUploadOptions::builder()
            .metadata(doc! { "contentType": content_type })
            .build();
        let mut upload = self
            .bucket
            .open_upload_stream_with_id(Bson::ObjectId(blob.0), file_name, options);

        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(bytes) => upload
                    .write_all(&bytes)
                    .await
                    .map_err(|e| LibraryError::StorageWriteFailed(e.to_string())),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                // Drops the chunks written so far
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!("Failed to abort GridFS upload {}: {}", blob, abort_err);
                }
                return Err(e);
            }
        }

        upload
            .close()
            .await
            .map_err(|e| LibraryError::StorageWriteFailed(e.to_string()))?;
        Ok(blob)
    }

    async fn open(&self, blob: BlobRef) -> LibraryResult<BlobReader> {
        let download = self
            .bucket
            .open_download_stream(Bson::ObjectId(blob.0))
            .await
            .map_err(|e| {
                if is_file_not_found(&e) {
                    LibraryError::BlobNotFound(blob.to_hex())
                } else {
                    LibraryError::from(e)
                }
            })?;
        Ok(ReaderStream::new(download.compat()).boxed())
    }

    async fn remove(&self, blob: BlobRef) -> LibraryResult<()> {
        match self.bucket.delete(Bson::ObjectId(blob.0)).await {
            Ok(()) => Ok(()),
            Err(e) if is_file_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

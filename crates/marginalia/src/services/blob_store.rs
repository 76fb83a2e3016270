//! Blob store service
//!
//! Wraps a `BlobBackend` with the upload policy: PDF content type only, a
//! per-file size ceiling enforced while streaming, no empty blobs. The
//! SHA-256 digest is computed on the same pass.

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::{LibraryConfig, PDF_CONTENT_TYPE};
use crate::error::{LibraryError, LibraryResult, RejectReason};
use crate::models::{BlobRef, StoredBlob};
use crate::storage::{BlobBackend, BlobReader};

/// Whether a declared content type is a PDF. Parameters such as
/// `; charset=binary` are ignored.
pub fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Running size and digest of a stream
struct ChunkMeter {
    hasher: Sha256,
    size: u64,
    limit: u64,
}

impl ChunkMeter {
    fn new(limit: usize) -> Self {
        Self {
            hasher: Sha256::new(),
            size: 0,
            limit: limit as u64,
        }
    }

    fn feed(&mut self, chunk: LibraryResult<Bytes>) -> LibraryResult<Bytes> {
        let chunk = chunk?;
        self.size += chunk.len() as u64;
        if self.size > self.limit {
            return Err(LibraryError::rejected(
                RejectReason::TooLarge,
                format!("file exceeds the {} byte limit", self.limit),
            ));
        }
        self.hasher.update(&chunk);
        Ok(chunk)
    }

    fn finish(self) -> (u64, String) {
        (self.size, hex::encode(self.hasher.finalize()))
    }
}

#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
    max_file_size: usize,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn BlobBackend>, config: &LibraryConfig) -> Self {
        Self {
            backend,
            max_file_size: config.max_file_size,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Store a stream of bytes as one blob
    pub async fn put<S>(
        &self,
        file_name: &str,
        content_type: &str,
        chunks: S,
    ) -> LibraryResult<StoredBlob>
    where
        S: Stream<Item = LibraryResult<Bytes>> + Send,
    {
        if !is_pdf_content_type(content_type) {
            return Err(LibraryError::rejected(
                RejectReason::UnsupportedType,
                format!("expected {}, got '{}'", PDF_CONTENT_TYPE, content_type),
            ));
        }

        let mut meter = ChunkMeter::new(self.max_file_size);
        let metered = chunks.map(|chunk| meter.feed(chunk)).boxed();
        let blob_ref = self
            .backend
            .write(file_name, PDF_CONTENT_TYPE, metered)
            .await
            .map_err(|e| match e {
                LibraryError::PayloadRejected { .. } | LibraryError::StorageWriteFailed(_) => e,
                other => LibraryError::StorageWriteFailed(other.to_string()),
            })?;
        let (size, sha256) = meter.finish();

        if size == 0 {
            if let Err(e) = self.delete(blob_ref).await {
                tracing::warn!(blob = %blob_ref, "orphan blob: empty upload cleanup failed: {}", e);
            }
            return Err(LibraryError::rejected(
                RejectReason::Empty,
                format!("'{}' has no content", file_name),
            ));
        }

        tracing::debug!(blob = %blob_ref, size, "blob stored");
        Ok(StoredBlob {
            blob_ref,
            size,
            sha256,
        })
    }

    /// Full read stream of a blob
    pub async fn get(&self, blob: BlobRef) -> LibraryResult<BlobReader> {
        self.backend.open(blob).await
    }

    /// Idempotent delete
    pub async fn delete(&self, blob: BlobRef) -> LibraryResult<()> {
        self.backend.remove(blob).await
    }
}

//! Document catalog model
//!
//! A catalog record describes one uploaded PDF; the bytes live in the blob
//! store and are referenced by `blob_id`. Records are stored in the `files`
//! collection, blobs in the GridFS bucket.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::security::Role;

/// Opaque reference to a stored blob (the GridFS file id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub ObjectId);

impl BlobRef {
    pub fn new() -> Self {
        BlobRef(ObjectId::new())
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for BlobRef {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Result of a committed blob write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub blob_ref: BlobRef,
    pub size: u64,
    /// Hex SHA-256 of the content, computed while streaming
    pub sha256: String,
}

/// Document metadata (stored in the files collection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub file_name: String,
    pub uploader_role: Role,
    pub blob_id: BlobRef,
    pub content_type: String,
    pub file_size: i64,
    pub sha256: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub upload_date: DateTime<Utc>,
}

impl FileRecord {
    /// Build an unsaved record for a freshly stored blob
    pub fn new(file_name: String, uploader_role: Role, content_type: &str, blob: &StoredBlob) -> Self {
        Self {
            id: None,
            file_name,
            uploader_role,
            blob_id: blob.blob_ref,
            content_type: content_type.to_string(),
            file_size: i64::try_from(blob.size).unwrap_or(i64::MAX),
            sha256: blob.sha256.clone(),
            upload_date: Utc::now(),
        }
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

/// Document summary returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub file_name: String,
    pub uploader_role: Role,
    pub upload_date: DateTime<Utc>,
    pub content_type: String,
    pub file_size: i64,
    pub sha256: String,
}

impl From<FileRecord> for DocumentSummary {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id_hex(),
            file_name: record.file_name,
            uploader_role: record.uploader_role,
            upload_date: record.upload_date,
            content_type: record.content_type,
            file_size: record.file_size,
            sha256: record.sha256,
        }
    }
}

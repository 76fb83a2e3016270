//! Library configuration module

use serde::{Deserialize, Serialize};

/// Content type accepted for uploads
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Upload and storage limits shared by every service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Per-file size ceiling in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Maximum number of files accepted by one bulk upload
    #[serde(default = "default_max_batch_files")]
    pub max_batch_files: usize,

    /// GridFS bucket that holds document bytes
    #[serde(default = "default_blob_bucket")]
    pub blob_bucket: String,
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_batch_files() -> usize {
    10
}

fn default_blob_bucket() -> String {
    "uploads".to_string()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_batch_files: default_max_batch_files(),
            blob_bucket: default_blob_bucket(),
        }
    }
}

impl LibraryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request body ceiling for a bulk upload: every file at its limit plus
    /// room for multipart framing.
    pub fn request_body_limit(&self) -> usize {
        const MULTIPART_OVERHEAD: usize = 64 * 1024;
        self.max_file_size
            .saturating_mul(self.max_batch_files.max(1))
            .saturating_add(MULTIPART_OVERHEAD)
    }
}

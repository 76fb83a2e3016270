//! Services module - business logic layer
//!
//! Services hold a `Storage` handle and enforce role capabilities, input
//! validation and the multi-step write sequences on top of it.

pub mod annotation_store;
pub mod blob_store;
pub mod file_catalog;

pub use annotation_store::AnnotationStore;
pub use blob_store::{is_pdf_content_type, BlobStore};
pub use file_catalog::{BatchUpload, FileCatalog};

//! Data models for the document catalog and annotations

mod annotation;
mod batch;
mod document;

pub use annotation::*;
pub use batch::*;
pub use document::*;

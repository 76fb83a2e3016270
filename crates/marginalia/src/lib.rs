//! Marginalia document library
//!
//! A shared PDF library where every caller acts under one of four roles.
//! Admins manage the catalog; everyone reads; doers annotate.
//!
//! # Features
//! - Role gate on every API route (`X-User-Role`)
//! - Streaming PDF upload (single and bulk) into GridFS or memory
//! - Document catalog with cascade deletion
//! - Role-scoped annotations with private and shared visibility
//! - Optimistic client reconciler with typed rollback

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod storage;

pub use config::LibraryConfig;
pub use db::MongoDb;
pub use error::{ApiError, LibraryError, LibraryResult};
pub use routes::{configure, AppState};
pub use security::Role;
pub use storage::Storage;

//! HTTP routes
//!
//! Every `/api` route sits behind the role middleware; handlers receive the
//! resolved role as `Extension<Role>`.

pub mod annotations;
pub mod files;

use axum::extract::{DefaultBodyLimit, FromRequest};
use axum::{middleware, Router};
use std::sync::Arc;

use crate::auth::{role_middleware, HeaderRoleGate, RoleResolver};
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::services::{AnnotationStore, FileCatalog};
use crate::storage::Storage;

/// Application state shared by all handlers
pub struct AppState {
    pub config: LibraryConfig,
    pub catalog: FileCatalog,
    pub annotations: AnnotationStore,
    pub roles: Arc<dyn RoleResolver>,
}

impl AppState {
    /// State with the default header-based role gate
    pub fn new(storage: Storage, config: LibraryConfig) -> Self {
        Self::with_resolver(storage, config, Arc::new(HeaderRoleGate))
    }

    pub fn with_resolver(
        storage: Storage,
        config: LibraryConfig,
        roles: Arc<dyn RoleResolver>,
    ) -> Self {
        Self {
            catalog: FileCatalog::new(storage.clone(), config.clone()),
            annotations: AnnotationStore::new(storage),
            config,
            roles,
        }
    }
}

/// JSON body extractor whose rejections use the library error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(LibraryError))]
pub struct ApiJson<T>(pub T);

impl From<axum::extract::rejection::JsonRejection> for LibraryError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        LibraryError::Validation(rejection.body_text())
    }
}

/// Configure all `/api` routes
pub fn configure(state: Arc<AppState>) -> Router {
    let body_limit = state.config.request_body_limit();
    Router::new()
        .merge(files::file_routes())
        .merge(annotations::annotation_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), role_middleware))
        .with_state(state)
}

//! Annotation routes

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::{ApiJson, AppState};
use crate::error::LibraryError;
use crate::models::{AnnotationPatch, AnnotationView, NewAnnotation};
use crate::security::Role;

pub fn annotation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/files/{file_id}/annotations",
            get(list_annotations).post(create_annotation),
        )
        .route(
            "/api/annotations/{annotation_id}",
            get(get_annotation)
                .patch(update_annotation)
                .delete(delete_annotation),
        )
}

async fn list_annotations(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(file_id): Path<String>,
) -> Result<Json<Vec<AnnotationView>>, LibraryError> {
    let items = state.annotations.list_visible_to(&file_id, role).await?;
    Ok(Json(items.into_iter().map(AnnotationView::from).collect()))
}

async fn create_annotation(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(file_id): Path<String>,
    ApiJson(req): ApiJson<NewAnnotation>,
) -> Result<(StatusCode, Json<AnnotationView>), LibraryError> {
    let annotation = state.annotations.create(&file_id, role, req).await?;
    Ok((StatusCode::CREATED, Json(annotation.into())))
}

async fn get_annotation(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(annotation_id): Path<String>,
) -> Result<Json<AnnotationView>, LibraryError> {
    let annotation = state.annotations.get_visible(&annotation_id, role).await?;
    Ok(Json(annotation.into()))
}

async fn update_annotation(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(annotation_id): Path<String>,
    ApiJson(patch): ApiJson<AnnotationPatch>,
) -> Result<Json<AnnotationView>, LibraryError> {
    let annotation = state.annotations.update(&annotation_id, role, patch).await?;
    Ok(Json(annotation.into()))
}

async fn delete_annotation(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(annotation_id): Path<String>,
) -> Result<StatusCode, LibraryError> {
    state.annotations.delete(&annotation_id, role).await?;
    Ok(StatusCode::NO_CONTENT)
}

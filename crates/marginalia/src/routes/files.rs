//! Document catalog routes

use axum::{
    body::Body,
    extract::{multipart::{MultipartError, MultipartRejection}, Extension, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::sync::Arc;

use super::AppState;
use crate::config::PDF_CONTENT_TYPE;
use crate::error::{LibraryError, LibraryResult, RejectReason};
use crate::models::{BatchReport, DocumentSummary};
use crate::security::{require, Capability, Role};

/// Multipart field carrying the file of a single upload
pub const FIELD_SINGLE: &str = "pdfFile";
/// Multipart field (repeated) carrying the files of a bulk upload
pub const FIELD_BULK: &str = "pdfFiles";

pub fn file_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/files/upload", post(upload_file))
        .route("/api/files/upload-bulk", post(upload_bulk))
        .route("/api/files/{file_id}", get(download_file).delete(delete_file))
        .route("/api/files/{file_id}/meta", get(get_file_meta))
}

fn multipart_error(err: MultipartError) -> LibraryError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        LibraryError::rejected(RejectReason::TooLarge, err.body_text())
    } else {
        LibraryError::StorageWriteFailed(format!("upload stream interrupted: {}", err.body_text()))
    }
}

fn multipart_body(
    multipart: Result<Multipart, MultipartRejection>,
) -> LibraryResult<Multipart> {
    multipart.map_err(|r| LibraryError::Validation(r.body_text()))
}

/// `Content-Disposition` value; the name is reduced to printable ASCII
fn inline_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("inline; filename=\"{}\"", safe)
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
) -> Result<Json<Vec<DocumentSummary>>, LibraryError> {
    require(role, Capability::Read, "list documents")?;
    let records = state.catalog.list().await?;
    Ok(Json(records.into_iter().map(DocumentSummary::from).collect()))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DocumentSummary>), LibraryError> {
    // Refuse before reading any of the body
    require(role, Capability::ManageCatalog, "upload documents")?;
    let mut multipart = multipart_body(multipart)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FIELD_SINGLE) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let chunks = field.map(|chunk| chunk.map_err(multipart_error));

        let record = state
            .catalog
            .upload(role, &file_name, &content_type, chunks)
            .await?;
        return Ok((StatusCode::CREATED, Json(record.into())));
    }

    Err(LibraryError::Validation(format!(
        "multipart field '{}' is required",
        FIELD_SINGLE
    )))
}

async fn upload_bulk(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BatchReport>), LibraryError> {
    let mut batch = state.catalog.begin_batch(role)?;
    let mut multipart = multipart_body(multipart)?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                // The body is unreadable from here on; keep what was stored
                let error = multipart_error(e);
                if batch.is_empty() {
                    return Err(error);
                }
                tracing::warn!(stored = batch.len(), "bulk upload body ended early: {}", error);
                break;
            }
        };
        if field.name() != Some(FIELD_BULK) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let chunks = field.map(|chunk| chunk.map_err(multipart_error));
        batch.push(&file_name, &content_type, chunks).await;
    }

    if batch.is_empty() {
        return Err(LibraryError::Validation(format!(
            "multipart field '{}' is required",
            FIELD_BULK
        )));
    }
    let report = batch.finish();
    Ok((report.status_code(), Json(report)))
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(file_id): Path<String>,
) -> Result<Response, LibraryError> {
    require(role, Capability::Read, "read documents")?;
    let record = state.catalog.get_by_id(&file_id).await?;
    let reader = state.catalog.blobs().get(record.blob_id).await?;

    let headers = [
        (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
        (header::CONTENT_LENGTH, record.file_size.to_string()),
        (header::CONTENT_DISPOSITION, inline_disposition(&record.file_name)),
    ];
    Ok((headers, Body::from_stream(reader)).into_response())
}

async fn get_file_meta(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(file_id): Path<String>,
) -> Result<Json<DocumentSummary>, LibraryError> {
    require(role, Capability::Read, "read documents")?;
    let record = state.catalog.get_by_id(&file_id).await?;
    Ok(Json(record.into()))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(role): Extension<Role>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, LibraryError> {
    state.catalog.delete_by_id(role, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

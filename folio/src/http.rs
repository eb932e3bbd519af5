//! HTTP API
//!
//! JSON endpoints for the library and for annotation persistence. Errors
//! come back as `{"error": "..."}` with a status derived from the
//! AppError variant.

use crate::app::AppState;
use crate::config::MAX_UPLOAD_BYTES;
use crate::database::{AnnotationDraft, UploadRequest};
use crate::error::{AppError, Result};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

/// Room for multipart boundaries and the text fields around the file
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/healthz", get(healthz))
        .route("/api/pdfs", get(list_documents))
        .route(
            "/api/upload",
            post(upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/api/pdfs/:id", get(get_document).delete(delete_document))
        .route("/api/pdfs/:id/download", get(download_document))
        .route(
            "/api/pdfs/:id/annotations",
            get(list_annotations).post(create_annotation),
        )
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_recoverable_locally() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    q: Option<String>,
}

async fn list_documents(
    State(st): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let documents = match query.q.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => st.library.search_documents(term).await?,
        _ => st.library.list_documents().await?,
    };
    Ok(Json(documents))
}

async fn upload_document(
    State(st): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title = None;
    let mut category = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("document.pdf").to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some((file_name, data.to_vec()));
            }
            Some("title") => title = Some(field.text().await.map_err(bad_multipart)?),
            Some("category") => category = Some(field.text().await.map_err(bad_multipart)?),
            other => tracing::debug!("Ignoring upload field {:?}", other),
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let document = st
        .library
        .upload_document(UploadRequest {
            file_name,
            title,
            category,
            data,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(e.body_text())
}

async fn get_document(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(st.library.get_document(&id).await?))
}

async fn delete_document(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    st.library.delete_document(&id).await?;
    Ok(Json(json!({ "deleted": id })))
}

async fn download_document(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let (document, data) = st.library.read_file(&id).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.file_name.replace('"', "")),
        ),
    ];
    Ok((headers, data))
}

#[derive(Debug, Deserialize)]
struct AnnotationQuery {
    page: Option<u32>,
}

async fn list_annotations(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnnotationQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(st.annotations.list_annotations(&id, query.page).await?))
}

async fn create_annotation(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<AnnotationDraft>,
) -> Result<impl IntoResponse> {
    let annotation = st.annotations.create_annotation(&id, draft).await?;
    Ok((StatusCode::CREATED, Json(annotation)))
}

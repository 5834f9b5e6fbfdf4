//! Document-grounded Q&A API handlers.
//!
//! Provides endpoints for:
//! - Text document upload into a named index
//! - Streamed answers grounded in an index
//! - Index listing

use crate::{
    AppState,
    api::handlers::chat::sse_frames,
    types::{AppError, IndexListResponse, Query, RagQueryRequest, Result, UploadResponse},
};
use axum::{
    Json,
    extract::{Multipart, State},
    response::sse::{Event, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use utoipa::ToSchema;

/// Multipart form accepted by the upload endpoint.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    /// PDF or UTF-8 text document (.pdf, .txt, .md, .markdown, .text)
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Target index; the configured default when omitted
    index_name: Option<String>,
}

/// Upload a PDF or text document into an index
#[utoipa::path(
    post,
    path = "/rag/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Document indexed", body = UploadResponse),
        (status = 400, description = "Missing file, unsupported type or invalid index name")
    ),
    tag = "rag"
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut index_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::InvalidInput("File field has no filename".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("index_name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Invalid index_name: {}", e)))?;
                index_name = Some(text);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown upload field");
            }
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::InvalidInput("Missing 'file' field".into()))?;

    let response = state.rag.upload(&filename, bytes, index_name).await?;
    Ok(Json(response))
}

/// Stream an answer grounded in an uploaded index
///
/// Frames: `content`*, then one `sources`, then `done`. A missing index or an
/// empty retrieval yields a single `error` frame.
#[utoipa::path(
    post,
    path = "/rag/query/stream",
    request_body = RagQueryRequest,
    responses(
        (status = 200, description = "Server-sent event stream of frames", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Query too short")
    ),
    tag = "rag"
)]
pub async fn query_stream(
    State(state): State<AppState>,
    Json(payload): Json<RagQueryRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let query = Query::with_min_length(payload.query)?;
    Ok(sse_frames(state.rag.stream_query(query, payload.index_name)))
}

/// List document indexes
#[utoipa::path(
    get,
    path = "/rag/indexes",
    responses(
        (status = 200, description = "Known indexes", body = IndexListResponse)
    ),
    tag = "rag"
)]
pub async fn list_indexes(State(state): State<AppState>) -> Json<IndexListResponse> {
    Json(IndexListResponse {
        indexes: state.rag.list_indexes().await,
    })
}

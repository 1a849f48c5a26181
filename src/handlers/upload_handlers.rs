//! Handlers for batch uploads and upload progress queries.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::report::{BatchOutcome, ProgressSnapshot};
use crate::models::user::Session;
use crate::services::uploader::{prepare_batch, CandidateFile};
use crate::state::AppState;

/// Query params accepted by the upload endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Caller-chosen batch id so progress can be polled while the upload
    /// request is still in flight. Server-assigned when absent.
    pub batch: Option<Uuid>,
}

/// POST `/api/media/upload` — ingest a multipart batch of media files.
///
/// Unsupported content types and exact in-batch duplicates are dropped
/// before processing; the response reports per-file outcomes. The whole
/// batch is rejected with 403 only when the caller lacks write access.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut raw = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("malformed multipart body: {err}")))?
    {
        // Only file fields carry media; plain form fields are ignored.
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read upload: {err}")))?;
        raw.push(CandidateFile {
            name,
            content_type,
            data,
        });
    }

    let files = prepare_batch(raw);
    if files.is_empty() {
        return Err(AppError::bad_request("no supported media files in upload"));
    }

    let batch_id = query.batch.unwrap_or_else(Uuid::new_v4);
    let report = state
        .pipeline
        .run_batch(&session.user, batch_id, files)
        .await;

    let status = if report.outcome == BatchOutcome::Unauthorized {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)).into_response())
}

/// GET `/api/uploads/{batch}/progress` — latest overall percentage of a
/// tracked batch.
pub async fn upload_progress(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let percent = state
        .uploads
        .snapshot(batch_id)
        .await
        .ok_or_else(|| AppError::not_found(format!("unknown upload batch {batch_id}")))?;
    Ok(Json(ProgressSnapshot { batch_id, percent }))
}

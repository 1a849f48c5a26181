//! Handlers for the soft-delete lifecycle and the recycle bin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::handlers::entry_handlers::EntryView;
use crate::models::report::BulkTrashReport;
use crate::models::user::Session;
use crate::services::catalog::Namespace;
use crate::state::AppState;

/// Body for bulk soft-delete.
#[derive(Debug, Deserialize)]
pub struct BulkTrashRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EmptyTrashResponse {
    pub purged: usize,
}

/// POST `/api/media/{id}/trash` — move one entry to the recycle bin.
pub async fn trash_media(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryView>, AppError> {
    let entry = state.lifecycle.move_to_bin(&session.user, id).await?;
    Ok(Json(EntryView::from(entry)))
}

/// POST `/api/media/trash` — move a selection to the recycle bin.
///
/// Always answers 200: per-item failures, permission rejections included,
/// are itemized in the report rather than failing the request.
pub async fn trash_media_bulk(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<BulkTrashRequest>,
) -> Json<BulkTrashReport> {
    Json(
        state
            .lifecycle
            .move_many_to_bin(&session.user, &body.ids)
            .await,
    )
}

/// GET `/api/trash` — every recycle-bin entry, newest first.
pub async fn list_trash(State(state): State<AppState>) -> Result<Json<Vec<EntryView>>, AppError> {
    let entries = state.catalog.list(Namespace::Trashed).await?;
    Ok(Json(entries.into_iter().map(EntryView::from).collect()))
}

/// POST `/api/trash/{id}/restore` — bring an entry back to the catalog.
pub async fn restore_media(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryView>, AppError> {
    let entry = state.lifecycle.restore(&session.user, id).await?;
    Ok(Json(EntryView::from(entry)))
}

/// DELETE `/api/trash/{id}` — permanently remove an entry and its payload.
pub async fn purge_media(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.purge(&session.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/api/trash` — purge every recycle-bin entry.
pub async fn empty_trash(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<EmptyTrashResponse>, AppError> {
    let purged = state.lifecycle.empty_bin(&session.user).await?;
    Ok(Json(EmptyTrashResponse { purged }))
}

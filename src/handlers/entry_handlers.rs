//! Handlers for the active catalog: listing, metadata edits, CSV export
//! and payload downloads.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entry::{MediaEntry, MediaKind, MetadataPatch, Visibility};
use crate::models::user::Session;
use crate::services::blob_store::StoredBlob;
use crate::services::catalog::Namespace;
use crate::services::export::{export_csv, EXPORT_FILENAME};
use crate::services::view::{self, SortMode, DEFAULT_PAGE_SIZE};
use crate::state::AppState;

/// Query params accepted by the catalog listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Media-kind tab; absent means all kinds.
    pub kind: Option<MediaKind>,
    /// Substring matched against title and description.
    pub q: Option<String>,
    pub visibility: Option<Visibility>,
    /// Upload day (UTC), `YYYY-MM-DD`.
    pub date: Option<NaiveDate>,
    pub sort: Option<SortMode>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// A catalog entry plus the display fields the listing shows.
#[derive(Debug, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: MediaEntry,
    pub size_display: String,
}

impl From<MediaEntry> for EntryView {
    fn from(entry: MediaEntry) -> Self {
        let size_display = view::format_size(Some(entry.size_bytes));
        Self {
            entry,
            size_display,
        }
    }
}

/// One page of the catalog, with the pre-pagination total.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<EntryView>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// GET `/api/media` — filtered, sorted, paginated slice of the catalog.
pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let mut entries = state.catalog.list(Namespace::Active).await?;
    entries = view::filter_by_kind(entries, query.kind);
    entries = view::search(entries, query.q.as_deref().unwrap_or(""));
    entries = view::filter_by_visibility(entries, query.visibility);
    entries = view::filter_by_date(entries, query.date);
    view::sort_entries(&mut entries, query.sort);

    let total = entries.len();
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let items = view::paginate(entries, page, per_page)
        .into_iter()
        .map(EntryView::from)
        .collect();

    Ok(Json(ListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// GET `/api/media/{id}` — one active entry.
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryView>, AppError> {
    let entry = state.catalog.get(Namespace::Active, id).await?;
    Ok(Json(EntryView::from(entry)))
}

/// PATCH `/api/media/{id}` — edit title, description or visibility.
pub async fn update_media(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(patch): Json<MetadataPatch>,
) -> Result<Json<EntryView>, AppError> {
    let entry = state
        .catalog
        .update_metadata(&session.user, id, patch)
        .await?;
    Ok(Json(EntryView::from(entry)))
}

/// GET `/api/media/export` — the catalog as a CSV attachment.
pub async fn export_media(State(state): State<AppState>) -> Result<Response, AppError> {
    let entries = state.catalog.list(Namespace::Active).await?;
    let csv = export_csv(&entries);

    let mut response = Response::new(Body::from(csv));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{EXPORT_FILENAME}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

/// GET `/api/media/{id}/download` — stream the entry's payload as an
/// attachment named after its title.
pub async fn download_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let entry = state.catalog.get(Namespace::Active, id).await?;
    let path = entry
        .storage_path
        .as_deref()
        .ok_or_else(|| AppError::not_found("entry has no stored payload"))?;

    let (blob, reader) = state.blobs.open(path).await?;
    let stream = ReaderStream::new(reader);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_blob_headers(response.headers_mut(), &blob);
    // Downloads are named after the catalog title, not the storage path.
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", entry.title))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

/// GET `/api/blobs/{*path}` — stream a stored blob with the headers
/// attached at upload.
pub async fn serve_blob(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let (blob, reader) = state.blobs.open(&path).await?;
    let stream = ReaderStream::new(reader);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_blob_headers(response.headers_mut(), &blob);
    Ok(response)
}

fn set_blob_headers(headers: &mut HeaderMap, blob: &StoredBlob) {
    let content_type = blob
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&blob.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    let quoted = format!("\"{}\"", blob.etag);
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    if let Some(disposition) = blob.content_disposition.as_deref() {
        if let Ok(value) = HeaderValue::from_str(disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
}

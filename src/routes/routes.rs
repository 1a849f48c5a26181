//! Defines routes for the media console's REST surface.
//!
//! ## Structure
//! - **Public endpoints**
//!   - `GET  /healthz` — liveness
//!   - `GET  /readyz` — readiness (DB + storage dir)
//!   - `POST /api/auth/login` — exchange credentials for a bearer token
//!
//! - **Guarded endpoints** (bearer token required)
//!   - `POST   /api/auth/logout` — revoke the session
//!   - `GET    /api/auth/me` — the signed-in account
//!   - `GET    /api/media` — filtered/sorted/paginated catalog
//!   - `GET    /api/media/export` — catalog as CSV
//!   - `POST   /api/media/upload` — multipart batch upload
//!   - `GET    /api/media/{id}` / `PATCH /api/media/{id}` — read / edit
//!   - `GET    /api/media/{id}/download` — payload as attachment
//!   - `POST   /api/media/{id}/trash` — soft delete
//!   - `POST   /api/media/trash` — bulk soft delete
//!   - `GET    /api/uploads/{batch}/progress` — batch percentage
//!   - `GET    /api/trash` / `DELETE /api/trash` — list / empty bin
//!   - `POST   /api/trash/{id}/restore` — restore
//!   - `DELETE /api/trash/{id}` — purge
//!   - `GET    /api/blobs/{*path}` — stored blob with upload headers
//!
//! The wildcard `*path` allows nested blob paths like `media/video/1_a.mp4`.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{
    auth_handlers::{login, logout, me, require_session},
    entry_handlers::{
        download_media, export_media, get_media, list_media, serve_blob, update_media,
    },
    health_handlers::{healthz, readyz},
    lifecycle_handlers::{
        empty_trash, list_trash, purge_media, restore_media, trash_media, trash_media_bulk,
    },
    upload_handlers::{upload_media, upload_progress},
};
use crate::state::AppState;

/// Largest accepted upload request body.
const UPLOAD_BODY_LIMIT: usize = 1024 * 1024 * 1024;

/// Build and return the router for the whole console.
///
/// Everything under `/api` except login sits behind the session guard;
/// the health probes stay open for the orchestrator.
pub fn routes(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/media", get(list_media))
        .route("/media/export", get(export_media))
        .route(
            "/media/upload",
            post(upload_media).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/media/trash", post(trash_media_bulk))
        .route("/media/{id}", get(get_media).patch(update_media))
        .route("/media/{id}/download", get(download_media))
        .route("/media/{id}/trash", post(trash_media))
        .route("/uploads/{batch}/progress", get(upload_progress))
        .route("/trash", get(list_trash).delete(empty_trash))
        .route("/trash/{id}", delete(purge_media))
        .route("/trash/{id}/restore", post(restore_media))
        .route("/blobs/{*path}", get(serve_blob))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/auth/login", post(login))
        .nest("/api", guarded)
        .with_state(state)
}

//! Handlers for sign-in, sign-out and session introspection.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::user::{Session, UserInfo};
use crate::services::identity::SignedInUser;
use crate::state::AppState;

/// Credentials posted by the sign-in form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST `/api/auth/login` — exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SignedInUser>, AppError> {
    let signed_in = state.identity.sign_in(&body.email, &body.password).await?;
    Ok(Json(signed_in))
}

/// POST `/api/auth/logout` — revoke the calling session's token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, AppError> {
    state.identity.sign_out(&session.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/auth/me` — describe the signed-in account.
pub async fn me(Extension(session): Extension<Session>) -> Json<UserInfo> {
    Json(session.user)
}

/// Middleware guarding everything nested under `/api`.
///
/// Resolves the bearer token to a [`Session`] and stores it in request
/// extensions so handlers can read the caller without touching the token
/// again. Requests without a usable token are rejected before routing.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::unauthenticated("login required"))?
        .to_string();
    let user = state.identity.current_user(&token).await?;
    request.extensions_mut().insert(Session { token, user });
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

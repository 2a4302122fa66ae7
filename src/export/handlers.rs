use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::services::export_project;
use crate::{
    auth::jwt::AuthUser,
    error::AppResult,
    projects::services::owned_project,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/export/:id", get(export))
}

/// GET /export/:id → zip attachment
#[instrument(skip(state))]
pub async fn export(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    owned_project(&state, user_id, id).await?;

    let archive = export_project(&state, id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&archive.filename)),
        ],
        archive.bytes,
    ))
}

/// `Content-Disposition` value for a download. Project names never carry
/// quotes or control characters, so the filename is quoted as is.
pub fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

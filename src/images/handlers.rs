use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use axum::extract::multipart::MultipartError;
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use super::dto::ImageItem;
use super::services::{add_images, delete_image};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    projects::services::owned_project,
    state::AppState,
};

pub const UPLOAD_LIMIT: usize = 50 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/images/:id", delete(remove_image))
        .route(
            "/projects/:id/images",
            post(upload_images).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
}

pub(crate) fn is_file_field(name: Option<&str>) -> bool {
    matches!(name, Some("files") | Some("files[]"))
}

pub(crate) fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {e}"))
}

/// POST /projects/:id/images (multipart files[])
#[instrument(skip(state, mp))]
pub async fn upload_images(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<Vec<ImageItem>>)> {
    let project = owned_project(&state, user_id, project_id).await?;

    let mut files: Vec<Bytes> = Vec::new();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        if is_file_field(field.name()) {
            files.push(field.bytes().await.map_err(bad_multipart)?);
        }
    }

    let images = add_images(&state, &project, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(images.into_iter().map(ImageItem::from).collect()),
    ))
}

#[instrument(skip(state))]
pub async fn remove_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_image(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

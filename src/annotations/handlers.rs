use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AnnotationInput, AnnotationItem};
use super::services::replace_annotations;
use crate::{auth::jwt::AuthUser, error::AppResult, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/images/:id/annotations", post(save_annotations))
}

/// POST /images/:id/annotations, replacing the image's boxes.
#[instrument(skip(state, body))]
pub async fn save_annotations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<Vec<AnnotationInput>>,
) -> AppResult<Json<Vec<AnnotationItem>>> {
    let saved = replace_annotations(&state, user_id, id, body).await?;
    Ok(Json(saved))
}

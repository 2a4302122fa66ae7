use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{ClassInput, ProjectDetails, ProjectItem, RenameProjectRequest};
use super::repo_types::Project;
use super::services::{create_project, delete_project, project_graph, rename_project, NewProject};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    images::handlers::{bad_multipart, is_file_field, UPLOAD_LIMIT},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects",
            get(list_projects).post(create).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/projects/:id", get(get_project).patch(rename).delete(remove))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<ProjectItem>>> {
    let projects = Project::list_by_user(&state.db, user_id).await?;
    Ok(Json(projects.into_iter().map(ProjectItem::from).collect()))
}

/// POST /projects (multipart: name, classes, files[])
#[instrument(skip(state, mp))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<ProjectItem>)> {
    let mut form = NewProject::default();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("name") => form.name = field.text().await.map_err(bad_multipart)?,
            Some("classes") => {
                let raw = field.bytes().await.map_err(bad_multipart)?;
                form.classes = serde_json::from_slice::<Vec<ClassInput>>(&raw).map_err(|e| {
                    warn!(error = %e, "classes field is not valid JSON");
                    AppError::BadRequest(format!("invalid classes: {e}"))
                })?;
            }
            other if is_file_field(other) => {
                form.files.push(field.bytes().await.map_err(bad_multipart)?)
            }
            _ => {}
        }
    }

    let project = create_project(&state, user_id, form).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/projects/{}", project.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(project.into())))
}

#[instrument(skip(state))]
pub async fn get_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectDetails>> {
    let graph = project_graph(&state, user_id, id).await?;
    Ok(Json(graph.into()))
}

#[instrument(skip(state, body))]
pub async fn rename(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameProjectRequest>,
) -> AppResult<Json<ProjectItem>> {
    let project = rename_project(&state, user_id, id, &body.name).await?;
    Ok(Json(project.into()))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_project(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

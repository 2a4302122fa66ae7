use std::collections::HashSet;

use bytes::Bytes;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::ClassInput;
use super::repo::load_graph;
use super::repo_types::{NewProjectRow, Project, ProjectGraph};
use crate::categories::{normalize_name, Category};
use crate::error::{AppError, AppResult};
use crate::images::remote::UploadedImage;
use crate::images::repo::Image;
use crate::images::services::{discard, upload_batch};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 256;
const MAX_CLASS_NAME_LEN: usize = 64;
const MAX_COLOR_LEN: usize = 16;

/// Fields of the project creation form.
#[derive(Debug, Default)]
pub struct NewProject {
    pub name: String,
    pub classes: Vec<ClassInput>,
    pub files: Vec<Bytes>,
}

/// Storage folder for a project's blobs. Derived from the id so it never
/// follows the (renamable) name.
pub fn storage_folder(project_id: Uuid) -> String {
    project_id.to_string()
}

/// Canonical project name: trimmed and upper-cased.
///
/// The name ends up in the export's `Content-Disposition` filename, so
/// quotes, backslashes, `/` and control characters are refused.
pub fn normalize_project_name(raw: &str) -> AppResult<String> {
    let name = raw.trim().to_uppercase();
    if name.is_empty() {
        return Err(AppError::BadRequest("project name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest("project name is too long".into()));
    }
    if name.chars().any(|c| c.is_control() || matches!(c, '"' | '\\' | '/')) {
        return Err(AppError::BadRequest(
            "project name must not contain quotes, slashes or control characters".into(),
        ));
    }
    Ok(name)
}

/// Every class needs a name and a color; names must differ ignoring case.
pub fn validate_classes(classes: &[ClassInput]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for c in classes {
        let key = normalize_name(&c.name);
        if key.is_empty() {
            return Err(AppError::BadRequest("class name is required".into()));
        }
        if key.chars().count() > MAX_CLASS_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "class name longer than {MAX_CLASS_NAME_LEN} characters"
            )));
        }
        let color = c.color.trim();
        if color.is_empty() {
            return Err(AppError::BadRequest(format!("class {key:?} has no color")));
        }
        if color.chars().count() > MAX_COLOR_LEN {
            return Err(AppError::BadRequest(format!(
                "class {key:?} color longer than {MAX_COLOR_LEN} characters"
            )));
        }
        if !seen.insert(key.clone()) {
            return Err(AppError::BadRequest(format!("duplicate class {key:?}")));
        }
    }
    Ok(())
}

#[instrument(skip(st, form), fields(name = %form.name, files = form.files.len()))]
pub async fn create_project(st: &AppState, user_id: Uuid, form: NewProject) -> AppResult<Project> {
    let name = normalize_project_name(&form.name)?;
    validate_classes(&form.classes)?;

    if Project::name_taken(&st.db, &name).await? {
        return Err(AppError::Conflict(format!("project {name} already exists")));
    }

    let project_id = Uuid::new_v4();
    let folder = storage_folder(project_id);
    let mut taken = HashSet::new();
    let uploaded = upload_batch(&st.remote, &folder, &mut taken, form.files).await?;

    let row = NewProjectRow {
        id: project_id,
        user_id,
        name: &name,
        folder: &folder,
    };
    match insert_project(st, row, &form.classes, &uploaded).await {
        Ok(project) => {
            info!(project_id = %project.id, images = uploaded.len(), "project created");
            Ok(project)
        }
        Err(e) => {
            discard(&st.remote, &uploaded).await;
            Err(e)
        }
    }
}

async fn insert_project(
    st: &AppState,
    row: NewProjectRow<'_>,
    classes: &[ClassInput],
    uploaded: &[UploadedImage],
) -> AppResult<Project> {
    let mut tx = st.db.begin().await?;
    let project = Project::insert_tx(&mut tx, row).await?;
    for c in classes {
        Category::insert_tx(&mut tx, project.id, &c.name, c.color.trim()).await?;
    }
    for u in uploaded {
        Image::insert_tx(&mut tx, project.id, u).await?;
    }
    tx.commit().await?;
    Ok(project)
}

pub async fn owned_project(st: &AppState, user_id: Uuid, project_id: Uuid) -> AppResult<Project> {
    Project::find_for_user(&st.db, project_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project", project_id))
}

pub async fn project_graph(st: &AppState, user_id: Uuid, project_id: Uuid) -> AppResult<ProjectGraph> {
    owned_project(st, user_id, project_id).await?;
    load_graph(&st.db, project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project", project_id))
}

#[instrument(skip(st))]
pub async fn rename_project(
    st: &AppState,
    user_id: Uuid,
    project_id: Uuid,
    raw_name: &str,
) -> AppResult<Project> {
    let project = owned_project(st, user_id, project_id).await?;
    let name = normalize_project_name(raw_name)?;
    if name == project.name {
        return Ok(project);
    }
    if Project::name_taken(&st.db, &name).await? {
        return Err(AppError::Conflict(format!("project {name} already exists")));
    }
    let renamed = Project::rename(&st.db, project.id, &name).await?;
    info!(%project_id, from = %project.name, to = %renamed.name, "project renamed");
    Ok(renamed)
}

/// Purges the project's storage folder, then deletes the row and everything
/// hanging off it.
#[instrument(skip(st))]
pub async fn delete_project(st: &AppState, user_id: Uuid, project_id: Uuid) -> AppResult<()> {
    let project = owned_project(st, user_id, project_id).await?;
    st.remote.delete_all(&project.folder).await?;
    Project::delete(&st.db, project.id).await?;
    info!(%project_id, "project deleted");
    Ok(())
}

use anyhow::Context;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{NewProjectRow, Project, ProjectGraph};
use crate::annotations::repo::Annotation;
use crate::categories::Category;
use crate::images::repo::Image;

const PROJECT_COLUMNS: &str = "id, user_id, name, folder, created_at";

impl Project {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        row: NewProjectRow<'_>,
    ) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(&format!(
            r#"
            INSERT INTO projects (id, user_id, name, folder)
            VALUES ($1, $2, $3, $4)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.name)
        .bind(row.folder)
        .fetch_one(&mut **tx)
        .await
        .context("insert project")?;
        Ok(project)
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
    ) -> anyhow::Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find project by id")?;
        Ok(project)
    }

    /// Project by id, only if it belongs to `user_id`.
    pub async fn find_for_user(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find project for user")?;
        Ok(project)
    }

    pub async fn name_taken(db: &PgPool, name: &str) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM projects WHERE name = $1)"#,
        )
        .bind(name)
        .fetch_one(db)
        .await
        .context("check project name")?;
        Ok(taken)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list projects by user")?;
        Ok(rows)
    }

    pub async fn rename(db: &PgPool, id: Uuid, name: &str) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects SET name = $2 WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_one(db)
        .await
        .context("rename project")?;
        Ok(project)
    }

    /// Deletes the row; categories, images and annotations cascade.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query(r#"DELETE FROM projects WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await
            .context("delete project")?;
        Ok(done.rows_affected() > 0)
    }
}

/// Loads a project with its categories, images and annotations, all in
/// insertion order. `None` when the project does not exist.
pub async fn load_graph(db: &PgPool, project_id: Uuid) -> anyhow::Result<Option<ProjectGraph>> {
    // one snapshot for the four reads
    let mut tx = db.begin().await.context("begin graph read")?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await
        .context("set graph read isolation")?;

    let Some(project) = Project::find_by_id(&mut *tx, project_id).await? else {
        return Ok(None);
    };
    let categories = Category::list_by_project(&mut *tx, project_id).await?;
    let images = Image::list_by_project(&mut *tx, project_id).await?;
    let annotations = Annotation::list_by_project(&mut *tx, project_id).await?;
    tx.commit().await.context("end graph read")?;

    Ok(Some(ProjectGraph::assemble(
        project,
        categories,
        images,
        annotations,
    )))
}

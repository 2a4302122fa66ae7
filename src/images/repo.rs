use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::remote::UploadedImage;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Image {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
    pub created_at: OffsetDateTime,
}

impl Image {
    /// Insert an uploaded image within a transaction.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        uploaded: &UploadedImage,
    ) -> anyhow::Result<Image> {
        let width = i32::try_from(uploaded.width).context("image width out of range")?;
        let height = i32::try_from(uploaded.height).context("image height out of range")?;
        let image = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (id, project_id, url, filename, width, height)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, project_id, url, filename, width, height, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(&uploaded.url)
        .bind(&uploaded.filename)
        .bind(width)
        .bind(height)
        .fetch_one(&mut **tx)
        .await
        .context("insert image")?;
        Ok(image)
    }

    /// Image by id, only if its project belongs to `user_id`.
    pub async fn find_for_user(
        db: &PgPool,
        image_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Image>> {
        let image = sqlx::query_as::<_, Image>(
            r#"
            SELECT i.id, i.project_id, i.url, i.filename, i.width, i.height, i.created_at
              FROM images i
              JOIN projects p ON p.id = i.project_id
             WHERE i.id = $1 AND p.user_id = $2
            "#,
        )
        .bind(image_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find image for user")?;
        Ok(image)
    }

    /// Images of a project in insertion order.
    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<Image>> {
        let rows = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, project_id, url, filename, width, height, created_at
              FROM images
             WHERE project_id = $1
             ORDER BY seq ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(db)
        .await
        .context("list images by project")?;
        Ok(rows)
    }

    pub async fn list_filenames<'e>(
        db: impl PgExecutor<'e>,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"SELECT filename FROM images WHERE project_id = $1"#,
        )
        .bind(project_id)
        .fetch_all(db)
        .await
        .context("list image filenames")?;
        Ok(rows)
    }

    /// Deletes the row; annotations go with it.
    pub async fn delete(db: &PgPool, image_id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query(r#"DELETE FROM images WHERE id = $1"#)
            .bind(image_id)
            .execute(db)
            .await
            .context("delete image")?;
        Ok(done.rows_affected() > 0)
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// Axis-aligned box in image pixels, origin at the top-left corner.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Annotation {
    pub id: Uuid,
    pub image_id: Uuid,
    pub category_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Annotation {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        image_id: Uuid,
        category_id: Uuid,
        geometry: BoxGeometry,
    ) -> anyhow::Result<Annotation> {
        let row = sqlx::query_as::<_, Annotation>(
            r#"
            INSERT INTO annotations (id, image_id, category_id, x, y, width, height)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, image_id, category_id, x, y, width, height, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(image_id)
        .bind(category_id)
        .bind(geometry.x)
        .bind(geometry.y)
        .bind(geometry.width)
        .bind(geometry.height)
        .fetch_one(&mut **tx)
        .await
        .context("insert annotation")?;
        Ok(row)
    }

    /// Removes every annotation of an image. Returns how many were removed.
    pub async fn delete_for_image_tx(
        tx: &mut Transaction<'_, Postgres>,
        image_id: Uuid,
    ) -> anyhow::Result<u64> {
        let done = sqlx::query(r#"DELETE FROM annotations WHERE image_id = $1"#)
            .bind(image_id)
            .execute(&mut **tx)
            .await
            .context("delete annotations for image")?;
        Ok(done.rows_affected())
    }

    /// Annotations of every image in a project, image-major, each image's
    /// annotations in insertion order.
    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<Annotation>> {
        let rows = sqlx::query_as::<_, Annotation>(
            r#"
            SELECT a.id, a.image_id, a.category_id, a.x, a.y, a.width, a.height, a.created_at
              FROM annotations a
              JOIN images i ON i.id = a.image_id
             WHERE i.project_id = $1
             ORDER BY i.seq ASC, a.seq ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(db)
        .await
        .context("list annotations by project")?;
        Ok(rows)
    }
}

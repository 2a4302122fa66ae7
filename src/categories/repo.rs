use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// Label category scoped to one project. `name` is always stored lower-cased.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: OffsetDateTime,
}

/// Canonical form used for storage and every lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Category {
    /// Insert a category; the name is normalized first.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        name: &str,
        color: &str,
    ) -> anyhow::Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, project_id, name, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, project_id, name, color, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(normalize_name(name))
        .bind(color)
        .fetch_one(&mut **tx)
        .await
        .context("insert category")?;
        Ok(category)
    }

    /// Case-insensitive lookup inside one project.
    pub async fn find_by_name<'e>(
        db: impl PgExecutor<'e>,
        project_id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, project_id, name, color, created_at
              FROM categories
             WHERE project_id = $1 AND name = $2
            "#,
        )
        .bind(project_id)
        .bind(normalize_name(name))
        .fetch_optional(db)
        .await
        .context("find category by name")?;
        Ok(category)
    }

    /// Categories of a project in insertion order.
    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, project_id, name, color, created_at
              FROM categories
             WHERE project_id = $1
             ORDER BY seq ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(db)
        .await
        .context("list categories by project")?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::auth::repo_types::User;
    use crate::projects::repo_types::{NewProjectRow, Project};

    async fn project(pool: &PgPool, name: &str) -> Uuid {
        let user = User::create(pool, &format!("{}-owner", name.to_lowercase()), "hash")
            .await
            .unwrap();
        let id = Uuid::new_v4();
        let folder = id.to_string();
        let mut tx = pool.begin().await.unwrap();
        let row = NewProjectRow {
            id,
            user_id: user.id,
            name,
            folder: &folder,
        };
        Project::insert_tx(&mut tx, row).await.unwrap();
        Category::insert_tx(&mut tx, id, " Dog ", "red").await.unwrap();
        tx.commit().await.unwrap();
        id
    }

    #[sqlx::test]
    async fn lookup_ignores_case(pool: PgPool) {
        let pid = project(&pool, "PETS").await;

        for query in ["dog", "DOG", " Dog"] {
            let found = Category::find_by_name(&pool, pid, query).await.unwrap().unwrap();
            assert_eq!(found.name, "dog");
            assert_eq!(found.color, "red");
        }
        assert!(Category::find_by_name(&pool, pid, "cat").await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn lookup_stays_inside_the_project(pool: PgPool) {
        let pets = project(&pool, "PETS").await;
        let farm = project(&pool, "FARM").await;

        let a = Category::find_by_name(&pool, pets, "dog").await.unwrap().unwrap();
        let b = Category::find_by_name(&pool, farm, "dog").await.unwrap().unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.project_id, farm);
    }

    #[sqlx::test]
    async fn same_name_in_other_case_is_a_duplicate(pool: PgPool) {
        let pid = project(&pool, "PETS").await;

        let mut tx = pool.begin().await.unwrap();
        let err = Category::insert_tx(&mut tx, pid, "DOG", "blue").await.unwrap_err();
        let db_err = err.downcast_ref::<sqlx::Error>().unwrap();
        assert_eq!(
            crate::error::unique_constraint(db_err),
            Some("uq_categories_project_name")
        );
    }

    #[test]
    fn lookup_key_ignores_case_and_padding() {
        assert_eq!(normalize_name("Dog"), "dog");
        assert_eq!(normalize_name("  DOG "), normalize_name("dog"));
        assert_eq!(normalize_name("Hot-Dog"), "hot-dog");
    }
}

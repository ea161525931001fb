use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::Category;

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn insert(&self, category: &Category) -> anyhow::Result<()>;
    async fn list(&self) -> anyhow::Result<Vec<Category>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>>;
    /// Oldest category with exactly this name.
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Category>>;
}

#[derive(Clone)]
pub struct PgCategoryStore {
    db: PgPool,
}

impl PgCategoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn insert(&self, category: &Category) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.db)
            .await
            .context("insert category")?;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find category by id")?;
        Ok(row)
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, created_at
              FROM categories
             WHERE name = $1
             ORDER BY created_at ASC
             LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("find category by name")?;
        Ok(row)
    }
}

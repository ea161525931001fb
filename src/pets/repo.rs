use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{AdopterSnapshot, Pet, PetChanges, PetRow};

/// Pet record store. Listings are newest first.
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn insert(&self, pet: &Pet) -> anyhow::Result<()>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>>;
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Pet>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Pet>>;
    async fn list_by_adopter(&self, adopter_id: Uuid) -> anyhow::Result<Vec<Pet>>;
    async fn list_by_category(&self, category_id: Uuid) -> anyhow::Result<Vec<Pet>>;
    /// `false` when the pet no longer exists.
    async fn update(&self, id: Uuid, changes: &PetChanges) -> anyhow::Result<bool>;
    /// Writes the adopter slot only if the pet is still available and its
    /// current adopter id equals `expected`. `false` means nothing was written.
    async fn set_adopter_if(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        adopter: &AdopterSnapshot,
    ) -> anyhow::Result<bool>;
    async fn mark_adopted(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const PET_COLUMNS: &str = "id, name, age, weight, color, images, available, \
    owner, category, adopter, created_at, updated_at";

#[derive(Clone)]
pub struct PgPetStore {
    db: PgPool,
}

impl PgPetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn list_where_snapshot(&self, column: &str, id: Uuid) -> anyhow::Result<Vec<Pet>> {
        let rows = sqlx::query_as::<_, PetRow>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE {column}->>'id' = $1 ORDER BY created_at DESC"
        ))
        .bind(id.to_string())
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list pets by {}", column))?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }
}

#[async_trait]
impl PetStore for PgPetStore {
    async fn insert(&self, pet: &Pet) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pets (id, name, age, weight, color, images, available,
                              owner, category, adopter, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(pet.id)
        .bind(&pet.name)
        .bind(pet.age)
        .bind(pet.weight)
        .bind(&pet.color)
        .bind(&pet.images)
        .bind(pet.available)
        .bind(Json(&pet.owner))
        .bind(Json(&pet.category))
        .bind(pet.adopter.as_ref().map(Json))
        .bind(pet.created_at)
        .bind(pet.updated_at)
        .execute(&self.db)
        .await
        .context("insert pet")?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query_as::<_, PetRow>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find pet by id")?;
        Ok(row.map(Pet::from))
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Pet>> {
        let rows = sqlx::query_as::<_, PetRow>(&format!(
            "SELECT {PET_COLUMNS} FROM pets ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list pets")?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        self.list_where_snapshot("owner", owner_id).await
    }

    async fn list_by_adopter(&self, adopter_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        self.list_where_snapshot("adopter", adopter_id).await
    }

    async fn list_by_category(&self, category_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        self.list_where_snapshot("category", category_id).await
    }

    async fn update(&self, id: Uuid, changes: &PetChanges) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE pets
               SET name = $2, age = $3, weight = $4, color = $5,
                   images = COALESCE($6, images), updated_at = $7
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(changes.age)
        .bind(changes.weight)
        .bind(&changes.color)
        .bind(&changes.images)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await
        .context("update pet")?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_adopter_if(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        adopter: &AdopterSnapshot,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE pets
               SET adopter = $2, updated_at = $4
             WHERE id = $1
               AND available
               AND (adopter->>'id') IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(id)
        .bind(Json(adopter))
        .bind(expected.map(|e| e.to_string()))
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await
        .context("set pet adopter")?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_adopted(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE pets SET available = FALSE, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(OffsetDateTime::now_utc())
            .execute(&self.db)
            .await
            .context("mark pet adopted")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete pet")?;
        Ok(res.rows_affected() == 1)
    }
}

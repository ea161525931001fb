//! In-memory stores. Used by tests and when no `DATABASE_URL` is configured.
//!
//! Each store serializes writers behind a [`tokio::sync::RwLock`], so the
//! conditional adopter write is atomic here just as the guarded `UPDATE` is
//! in Postgres.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    categories::{repo::CategoryStore, repo_types::Category},
    pets::{
        repo::PetStore,
        repo_types::{AdopterSnapshot, Pet, PetChanges},
    },
    users::{
        repo::{EmailTaken, UserStore},
        repo_types::User,
    },
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(EmailTaken.into());
        }
        users.push(user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email && u.id != user.id) {
            return Err(EmailTaken.into());
        }
        if let Some(slot) = users.iter_mut().find(|u| u.id == user.id) {
            *slot = user.clone();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCategoryStore {
    categories: RwLock<Vec<Category>>,
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn insert(&self, category: &Category) -> anyhow::Result<()> {
        self.categories.write().await.push(category.clone());
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<Category>> {
        let mut all = self.categories.read().await.clone();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Category>> {
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Category>> {
        // insertion order is creation order
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryPetStore {
    pets: RwLock<Vec<Pet>>,
}

impl MemoryPetStore {
    /// Newest first; later inserts win ties on `created_at`.
    async fn select(&self, keep: impl Fn(&Pet) -> bool + Send) -> Vec<Pet> {
        let mut out: Vec<Pet> = self
            .pets
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| keep(*p))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[async_trait]
impl PetStore for MemoryPetStore {
    async fn insert(&self, pet: &Pet) -> anyhow::Result<()> {
        self.pets.write().await.push(pet.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        Ok(self.pets.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Pet>> {
        Ok(self
            .select(|_| true)
            .await
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(if offset < 0 { 0 } else { usize::MAX }))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        Ok(self.select(|p| p.owner.id == owner_id).await)
    }

    async fn list_by_adopter(&self, adopter_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        Ok(self
            .select(|p| p.adopter.as_ref().is_some_and(|a| a.id == adopter_id))
            .await)
    }

    async fn list_by_category(&self, category_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        Ok(self.select(|p| p.category.id == category_id).await)
    }

    async fn update(&self, id: Uuid, changes: &PetChanges) -> anyhow::Result<bool> {
        let mut pets = self.pets.write().await;
        let Some(pet) = pets.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        pet.name = changes.name.clone();
        pet.age = changes.age;
        pet.weight = changes.weight;
        pet.color = changes.color.clone();
        if let Some(images) = &changes.images {
            pet.images = images.clone();
        }
        pet.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn set_adopter_if(
        &self,
        id: Uuid,
        expected: Option<Uuid>,
        adopter: &AdopterSnapshot,
    ) -> anyhow::Result<bool> {
        let mut pets = self.pets.write().await;
        let Some(pet) = pets.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        if !pet.available || pet.adopter.as_ref().map(|a| a.id) != expected {
            return Ok(false);
        }
        pet.adopter = Some(adopter.clone());
        pet.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn mark_adopted(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut pets = self.pets.write().await;
        let Some(pet) = pets.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        pet.available = false;
        pet.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut pets = self.pets.write().await;
        let before = pets.len();
        pets.retain(|p| p.id != id);
        Ok(pets.len() != before)
    }
}

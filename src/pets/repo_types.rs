//! Pet records and the snapshots embedded in them.
//!
//! Owner, category and adopter are point-in-time copies taken when the pet is
//! created or scheduled. They are not refreshed when the source record changes,
//! so a renamed owner keeps their old name on existing listings.

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{categories::repo_types::Category, users::repo_types::User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub phone: String,
}

impl OwnerSnapshot {
    pub fn of(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            image: user.image.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    pub id: Uuid,
    pub name: String,
}

impl CategorySnapshot {
    pub fn of(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdopterSnapshot {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl AdopterSnapshot {
    pub fn of(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub color: String,
    pub images: Vec<String>,
    pub available: bool,
    pub owner: OwnerSnapshot,
    pub category: CategorySnapshot,
    pub adopter: Option<AdopterSnapshot>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Editable scalar fields. Owner and category are never part of an update.
#[derive(Debug, Clone)]
pub struct PetChanges {
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub color: String,
    /// `None` keeps the current images.
    pub images: Option<Vec<String>>,
}

/// Database row; snapshots live in JSONB columns.
#[derive(Debug, FromRow)]
pub struct PetRow {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub color: String,
    pub images: Vec<String>,
    pub available: bool,
    pub owner: Json<OwnerSnapshot>,
    pub category: Json<CategorySnapshot>,
    pub adopter: Option<Json<AdopterSnapshot>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<PetRow> for Pet {
    fn from(r: PetRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            age: r.age,
            weight: r.weight,
            color: r.color,
            images: r.images,
            available: r.available,
            owner: r.owner.0,
            category: r.category.0,
            adopter: r.adopter.map(|a| a.0),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

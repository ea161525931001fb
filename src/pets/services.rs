use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{NewPet, Pagination, PetUpdate},
    lifecycle::{ensure_owner, plan_conclude, plan_schedule},
    repo_types::{CategorySnapshot, OwnerSnapshot, Pet, PetChanges},
};
use crate::{
    auth::claims::Identity,
    error::{AppError, AppResult},
    images::services::{delete_images, upload_images},
    state::AppState,
    users::repo_types::User,
};

async fn load(st: &AppState, id: Uuid) -> AppResult<Pet> {
    st.pets.find_by_id(id).await?.ok_or(AppError::NotFound("Pet"))
}

/// Lists a new pet as `owner`. The pet starts available with no adopter.
pub async fn create_pet(st: &AppState, owner: &User, new_pet: NewPet) -> AppResult<Pet> {
    let Some(category) = st.categories.find_by_name(&new_pet.category).await? else {
        warn!(category = %new_pet.category, "unknown category");
        return Err(AppError::UnknownCategory);
    };

    let images = upload_images(st, "pets", owner.id, new_pet.images).await?;
    let now = OffsetDateTime::now_utc();
    let pet = Pet {
        id: Uuid::new_v4(),
        name: new_pet.attrs.name,
        age: new_pet.attrs.age,
        weight: new_pet.attrs.weight,
        color: new_pet.attrs.color,
        images,
        available: true,
        owner: OwnerSnapshot::of(owner),
        category: CategorySnapshot::of(&category),
        adopter: None,
        created_at: now,
        updated_at: now,
    };
    if let Err(e) = st.pets.insert(&pet).await {
        delete_images(st, &pet.images).await;
        return Err(e.into());
    }

    info!(pet_id = %pet.id, owner_id = %owner.id, "pet created");
    Ok(pet)
}

pub async fn get_pet(st: &AppState, id: Uuid) -> AppResult<Pet> {
    load(st, id).await
}

pub async fn list_pets(st: &AppState, p: &Pagination) -> AppResult<(Vec<Pet>, i64, i64)> {
    let (page, limit, offset) = p.resolve(st.config.page_limit_max);
    let pets = st.pets.list(limit, offset).await?;
    Ok((pets, page, limit))
}

pub async fn list_owned(st: &AppState, identity: &Identity) -> AppResult<Vec<Pet>> {
    Ok(st.pets.list_by_owner(identity.id).await?)
}

pub async fn list_adoptions(st: &AppState, identity: &Identity) -> AppResult<Vec<Pet>> {
    Ok(st.pets.list_by_adopter(identity.id).await?)
}

pub async fn list_by_category(st: &AppState, category_id: Uuid) -> AppResult<Vec<Pet>> {
    Ok(st.pets.list_by_category(category_id).await?)
}

/// Loads the pet and checks that `identity` owns it. Runs before the update
/// form is read, so a missing pet or a foreign one is reported as such rather
/// than as a form error.
pub async fn authorize_update(st: &AppState, identity: &Identity, id: Uuid) -> AppResult<Pet> {
    let pet = load(st, id).await?;
    if let Err(e) = ensure_owner(&pet, identity.id) {
        warn!(pet_id = %id, user_id = %identity.id, "update by non-owner");
        return Err(e);
    }
    Ok(pet)
}

/// Owner-only edit of the scalar fields. New images replace the old ones.
pub async fn update_pet(
    st: &AppState,
    identity: &Identity,
    id: Uuid,
    update: PetUpdate,
) -> AppResult<Pet> {
    let pet = authorize_update(st, identity, id).await?;

    let images = if update.images.is_empty() {
        None
    } else {
        Some(upload_images(st, "pets", pet.owner.id, update.images).await?)
    };
    let changes = PetChanges {
        name: update.attrs.name,
        age: update.attrs.age,
        weight: update.attrs.weight,
        color: update.attrs.color,
        images,
    };
    let outcome = match st.pets.update(id, &changes).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::NotFound("Pet")),
        Err(e) => Err(AppError::from(e)),
    };
    if let Err(e) = outcome {
        if let Some(uploaded) = &changes.images {
            delete_images(st, uploaded).await;
        }
        return Err(e);
    }
    if changes.images.is_some() {
        delete_images(st, &pet.images).await;
    }

    info!(pet_id = %id, "pet updated");
    load(st, id).await
}

pub async fn remove_pet(st: &AppState, identity: &Identity, id: Uuid) -> AppResult<()> {
    let pet = load(st, id).await?;
    if let Err(e) = ensure_owner(&pet, identity.id) {
        warn!(pet_id = %id, user_id = %identity.id, "delete by non-owner");
        return Err(e);
    }
    if !st.pets.delete(id).await? {
        return Err(AppError::NotFound("Pet"));
    }
    delete_images(st, &pet.images).await;
    info!(pet_id = %id, "pet removed");
    Ok(())
}

/// Books a visit for `requester`. The adopter slot is written only if it still
/// holds what was read here; a concurrent write turns into `ScheduleConflict`
/// instead of being silently overwritten.
pub async fn schedule_visit(st: &AppState, requester: &User, id: Uuid) -> AppResult<Pet> {
    let mut pet = load(st, id).await?;
    let adopter = match plan_schedule(&pet, requester) {
        Ok(a) => a,
        Err(e) => {
            warn!(pet_id = %id, user_id = %requester.id, error = %e, "schedule rejected");
            return Err(e);
        }
    };

    let expected = pet.adopter.as_ref().map(|a| a.id);
    if !st.pets.set_adopter_if(id, expected, &adopter).await? {
        warn!(pet_id = %id, user_id = %requester.id, "schedule lost a race");
        return Err(AppError::ScheduleConflict);
    }

    if let Some(previous) = expected {
        info!(pet_id = %id, %previous, adopter_id = %adopter.id, "visit slot reassigned");
    } else {
        info!(pet_id = %id, adopter_id = %adopter.id, "visit scheduled");
    }
    pet.adopter = Some(adopter);
    Ok(pet)
}

/// Owner confirms the adoption. The adopter slot is kept.
pub async fn conclude_adoption(st: &AppState, identity: &Identity, id: Uuid) -> AppResult<Pet> {
    let mut pet = load(st, id).await?;
    if let Err(e) = plan_conclude(&pet, identity.id) {
        warn!(pet_id = %id, user_id = %identity.id, error = %e, "conclude rejected");
        return Err(e);
    }
    if !st.pets.mark_adopted(id).await? {
        return Err(AppError::NotFound("Pet"));
    }
    pet.available = false;
    info!(pet_id = %id, adopter = ?pet.adopter.as_ref().map(|a| a.id), "adoption concluded");
    Ok(pet)
}

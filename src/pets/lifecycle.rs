//! Adoption lifecycle of a pet listing.
//!
//! The state is not stored; it is derived from `available` and `adopter`:
//!
//! ```text
//! Listed ──schedule──▶ VisitScheduled ──conclude──▶ Adopted
//!   └────────────────────conclude──────────────────────▲
//! ```
//!
//! A scheduled visit can be taken over by a different requester (there is a
//! single adopter slot and no waitlist). There is no way back out of `Adopted`.

use serde::Serialize;
use uuid::Uuid;

use super::repo_types::{AdopterSnapshot, Pet};
use crate::{
    error::{AppError, AppResult},
    users::repo_types::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Listed,
    VisitScheduled,
    Adopted,
}

impl Pet {
    pub fn lifecycle(&self) -> LifecycleState {
        match (self.available, &self.adopter) {
            (false, _) => LifecycleState::Adopted,
            (true, None) => LifecycleState::Listed,
            (true, Some(_)) => LifecycleState::VisitScheduled,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner.id == user_id
    }
}

/// Mutations other than scheduling are owner-only.
pub fn ensure_owner(pet: &Pet, actor: Uuid) -> AppResult<()> {
    if pet.is_owned_by(actor) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Checks a visit request and returns the adopter snapshot to store.
pub fn plan_schedule(pet: &Pet, requester: &User) -> AppResult<AdopterSnapshot> {
    if pet.is_owned_by(requester.id) {
        return Err(AppError::SelfScheduleForbidden);
    }
    if pet.lifecycle() == LifecycleState::Adopted {
        return Err(AppError::PetUnavailable);
    }
    if pet.adopter.as_ref().is_some_and(|a| a.id == requester.id) {
        return Err(AppError::AlreadyScheduled);
    }
    Ok(AdopterSnapshot::of(requester))
}

/// Concluding is the owner confirming an adoption that happened offline. The
/// adopter slot is left as it is.
pub fn plan_conclude(pet: &Pet, actor: Uuid) -> AppResult<()> {
    ensure_owner(pet, actor)?;
    if pet.lifecycle() == LifecycleState::Adopted {
        return Err(AppError::PetUnavailable);
    }
    Ok(())
}

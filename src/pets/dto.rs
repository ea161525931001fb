use serde::{Deserialize, Serialize};

use super::repo_types::Pet;
use crate::{
    error::{AppError, AppResult},
    images::form::{MultipartForm, UploadItem},
    validation::{non_negative_int, positive_number, required},
};

/// Raw pet form as posted (multipart). Nothing is checked yet.
#[derive(Debug, Default)]
pub struct PetForm {
    pub name: Option<String>,
    pub age: Option<String>,
    pub weight: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub images: Vec<UploadItem>,
}

impl From<MultipartForm> for PetForm {
    fn from(mut form: MultipartForm) -> Self {
        Self {
            name: form.take_text("name"),
            age: form.take_text("age"),
            weight: form.take_text("weight"),
            color: form.take_text("color"),
            category: form.take_text("category"),
            images: form.take_files("images"),
        }
    }
}

/// Scalar pet attributes that passed validation.
#[derive(Debug, Clone)]
pub struct PetAttrs {
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub color: String,
}

#[derive(Debug)]
pub struct NewPet {
    pub attrs: PetAttrs,
    pub category: String,
    pub images: Vec<UploadItem>,
}

#[derive(Debug)]
pub struct PetUpdate {
    pub attrs: PetAttrs,
    /// Empty keeps the current images.
    pub images: Vec<UploadItem>,
}

impl PetForm {
    fn attrs(&mut self) -> AppResult<PetAttrs> {
        let name = required(self.name.take(), "Name is required")?;
        let age = required(self.age.take(), "Age is required")?;
        let age = non_negative_int(&age, "Age must be a whole number")?;
        let weight = required(self.weight.take(), "Weight is required")?;
        let weight = positive_number(&weight, "Weight must be a positive number")?;
        let color = required(self.color.take(), "Color is required")?;
        Ok(PetAttrs { name, age, weight, color })
    }

    /// Field order: images, name, age, weight, color, category.
    pub fn into_new_pet(mut self) -> AppResult<NewPet> {
        if self.images.is_empty() {
            return Err(AppError::validation("At least one image is required"));
        }
        let attrs = self.attrs()?;
        let category = required(self.category.take(), "Category is required")?;
        Ok(NewPet { attrs, category, images: self.images })
    }

    /// Field order: name, age, weight, color. Category is ignored.
    pub fn into_update(mut self) -> AppResult<PetUpdate> {
        let attrs = self.attrs()?;
        Ok(PetUpdate { attrs, images: self.images })
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;

impl Pagination {
    /// Returns `(page, limit, offset)`. Page is at least 1 and limit is in
    /// `1..=max_limit`, defaulting to 20. An offset past `i64::MAX` saturates,
    /// which reads as an empty page.
    pub fn resolve(&self, max_limit: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = match self.limit {
            Some(l) if l >= 1 => l.min(max_limit.max(1)),
            _ => DEFAULT_PAGE_LIMIT.min(max_limit.max(1)),
        };
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

#[derive(Debug, Serialize)]
pub struct PetPage {
    pub pets: Vec<Pet>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct PetList {
    pub pets: Vec<Pet>,
}

#[derive(Debug, Serialize)]
pub struct PetResponse {
    pub pet: Pet,
}

#[derive(Debug, Serialize)]
pub struct CreatedPetResponse {
    pub msg: String,
    pub pet: Pet,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> MultipartForm {
        MultipartForm::default()
            .with_text("name", "Rex")
            .with_text("age", "2")
            .with_text("weight", "10")
            .with_text("color", "brown")
            .with_text("category", "Dog")
            .with_file("images", b"jpeg-bytes", "image/jpeg")
    }

    fn validation_msg(err: AppError) -> String {
        match err {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn complete_form_is_accepted() {
        let new_pet = PetForm::from(full_form()).into_new_pet().unwrap();
        assert_eq!(new_pet.attrs.name, "Rex");
        assert_eq!(new_pet.attrs.age, 2);
        assert_eq!(new_pet.attrs.weight, 10.0);
        assert_eq!(new_pet.category, "Dog");
        assert_eq!(new_pet.images.len(), 1);
    }

    #[test]
    fn images_are_checked_before_anything_else() {
        let form = PetForm::default();
        assert_eq!(
            validation_msg(form.into_new_pet().unwrap_err()),
            "At least one image is required"
        );
    }

    #[test]
    fn first_missing_field_wins() {
        let form = PetForm {
            images: PetForm::from(full_form()).images,
            color: Some("brown".into()),
            ..Default::default()
        };
        // name comes before color, and only one failure is reported
        assert_eq!(validation_msg(form.into_new_pet().unwrap_err()), "Name is required");

        let mut form = PetForm::from(full_form());
        form.weight = None;
        form.category = None;
        assert_eq!(validation_msg(form.into_new_pet().unwrap_err()), "Weight is required");
    }

    #[test]
    fn non_numeric_age_is_rejected() {
        let mut form = PetForm::from(full_form());
        form.age = Some("two".into());
        assert_eq!(
            validation_msg(form.into_new_pet().unwrap_err()),
            "Age must be a whole number"
        );
    }

    #[test]
    fn update_does_not_need_images_or_category() {
        let mut form = PetForm::from(full_form());
        form.images.clear();
        form.category = None;
        let update = form.into_update().unwrap();
        assert!(update.images.is_empty());
        assert_eq!(update.attrs.color, "brown");
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let p = Pagination { page: None, limit: None };
        assert_eq!(p.resolve(100), (1, 20, 0));
        let p = Pagination { page: Some(3), limit: Some(10) };
        assert_eq!(p.resolve(100), (3, 10, 20));
        let p = Pagination { page: Some(0), limit: Some(-5) };
        assert_eq!(p.resolve(100), (1, 20, 0));
        let p = Pagination { page: Some(2), limit: Some(10_000) };
        assert_eq!(p.resolve(100), (2, 100, 100));
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let p = Pagination { page: Some(i64::MAX), limit: Some(20) };
        assert_eq!(p.resolve(100), (i64::MAX, 20, i64::MAX));
        let p = Pagination { page: Some(i64::MAX / 2), limit: None };
        let (_, _, offset) = p.resolve(100);
        assert_eq!(offset, i64::MAX);
    }
}

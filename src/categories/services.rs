use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{dto::CreateCategoryRequest, repo_types::Category};
use crate::{
    auth::claims::Identity,
    error::{AppError, AppResult},
    state::AppState,
    validation::required,
};

/// Any authenticated user may add a category.
pub async fn create_category(
    st: &AppState,
    identity: &Identity,
    req: CreateCategoryRequest,
) -> AppResult<Category> {
    let name = required(req.name, "Category name is required")?;
    let category = Category {
        id: Uuid::new_v4(),
        name,
        created_at: OffsetDateTime::now_utc(),
    };
    st.categories.insert(&category).await?;
    info!(category_id = %category.id, name = %category.name, user_id = %identity.id, "category created");
    Ok(category)
}

pub async fn list_categories(st: &AppState) -> AppResult<Vec<Category>> {
    Ok(st.categories.list().await?)
}

pub async fn get_category(st: &AppState, id: Uuid) -> AppResult<Category> {
    st.categories
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Category"))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CategoryListResponse, CategoryResponse, CreateCategoryRequest, CreatedCategoryResponse},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    extract::JsonBody,
    error::{parse_id, AppResult},
    state::AppState,
};

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/create", post(create_category))
        .route("/categories/:id", get(get_category))
}

#[instrument(skip(state, identity, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(payload): JsonBody<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CreatedCategoryResponse>)> {
    let category = services::create_category(&state, &identity, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedCategoryResponse {
            msg: "Category added successfully".into(),
            category,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<CategoryListResponse>> {
    let categories = services::list_categories(&state).await?;
    Ok(Json(CategoryListResponse { categories }))
}

#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CategoryResponse>> {
    let category = services::get_category(&state, parse_id(&id)?).await?;
    Ok(Json(CategoryResponse { category }))
}

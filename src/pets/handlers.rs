use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreatedPetResponse, Pagination, PetForm, PetList, PetPage, PetResponse},
    services,
};
use crate::{
    auth::extractors::{AuthUser, CurrentUser},
    extract::QueryParams,
    error::{parse_id, AppResult},
    images::form::MultipartForm,
    response::MsgResponse,
    state::AppState,
};

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_pets))
        .route("/pets/mypets", get(my_pets))
        .route("/pets/myadoptions", get(my_adoptions))
        .route("/pets/category/:id", get(pets_by_category))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/pets/create", post(create_pet))
        .route(
            "/pets/:id",
            get(get_pet).delete(remove_pet).patch(update_pet),
        )
        .route("/pets/schedule/:id", patch(schedule_visit))
        .route("/pets/conclude/:id", patch(conclude_adoption))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

// --- handlers ---

#[instrument(skip(state, owner, mp))]
pub async fn create_pet(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<CreatedPetResponse>)> {
    let new_pet = PetForm::from(MultipartForm::read(mp).await?).into_new_pet()?;
    let pet = services::create_pet(&state, &owner, new_pet).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedPetResponse {
            msg: "Pet registered successfully".into(),
            pet,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_pets(
    State(state): State<AppState>,
    QueryParams(p): QueryParams<Pagination>,
) -> AppResult<Json<PetPage>> {
    let (pets, page, limit) = services::list_pets(&state, &p).await?;
    Ok(Json(PetPage { pets, page, limit }))
}

#[instrument(skip(state, identity))]
pub async fn my_pets(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<PetList>> {
    let pets = services::list_owned(&state, &identity).await?;
    Ok(Json(PetList { pets }))
}

#[instrument(skip(state, identity))]
pub async fn my_adoptions(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<PetList>> {
    let pets = services::list_adoptions(&state, &identity).await?;
    Ok(Json(PetList { pets }))
}

#[instrument(skip(state))]
pub async fn get_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PetResponse>> {
    let pet = services::get_pet(&state, parse_id(&id)?).await?;
    Ok(Json(PetResponse { pet }))
}

#[instrument(skip(state))]
pub async fn pets_by_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PetList>> {
    let pets = services::list_by_category(&state, parse_id(&id)?).await?;
    Ok(Json(PetList { pets }))
}

#[instrument(skip(state, identity))]
pub async fn remove_pet(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MsgResponse>> {
    services::remove_pet(&state, &identity, parse_id(&id)?).await?;
    Ok(Json(MsgResponse::new("Pet removed successfully")))
}

#[instrument(skip(state, identity, mp))]
pub async fn update_pet(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    mp: Multipart,
) -> AppResult<Json<MsgResponse>> {
    let id = parse_id(&id)?;
    services::authorize_update(&state, &identity, id).await?;
    let update = PetForm::from(MultipartForm::read(mp).await?).into_update()?;
    services::update_pet(&state, &identity, id, update).await?;
    Ok(Json(MsgResponse::new("Pet updated successfully")))
}

#[instrument(skip(state, requester))]
pub async fn schedule_visit(
    State(state): State<AppState>,
    CurrentUser(requester): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<MsgResponse>> {
    let pet = services::schedule_visit(&state, &requester, parse_id(&id)?).await?;
    Ok(Json(MsgResponse::new(format!(
        "Visit scheduled successfully, contact {} by phone {}",
        pet.owner.name, pet.owner.phone
    ))))
}

#[instrument(skip(state, identity))]
pub async fn conclude_adoption(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MsgResponse>> {
    services::conclude_adoption(&state, &identity, parse_id(&id)?).await?;
    Ok(Json(MsgResponse::new(
        "Congratulations! The adoption was completed successfully",
    )))
}

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AuthResponse, EditUserForm, ForgotPasswordRequest, LoginRequest, PublicUser,
        RegisterRequest, ResetPasswordRequest, UserResponse,
    },
    services,
};
use crate::{
    auth::extractors::{CurrentUser, MaybeAuthUser},
    extract::JsonBody,
    error::{parse_id, AppResult},
    images::form::MultipartForm,
    state::AppState,
    response::MsgResponse,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/checkuser", get(check_user))
        .route("/users/:id", get(get_user_by_id))
        .route(
            "/users/edit/:id",
            patch(edit_user).layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
        .route("/users/forgot_password", post(forgot_password))
        .route("/users/reset_password/:token/:id", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            msg: "You are authenticated".into(),
            token,
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, token) = services::login(&state, payload).await?;
    Ok(Json(AuthResponse {
        msg: "You are authenticated".into(),
        token,
        user_id: user.id,
    }))
}

/// The caller's profile, or `null` when no token was sent.
#[instrument(skip(state, identity))]
pub async fn check_user(
    State(state): State<AppState>,
    MaybeAuthUser(identity): MaybeAuthUser,
) -> AppResult<Json<Option<PublicUser>>> {
    let Some(identity) = identity else {
        return Ok(Json(None));
    };
    let user = state.users.find_by_id(identity.id).await?;
    Ok(Json(user.map(PublicUser::from)))
}

#[instrument(skip(state))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let user = services::get_user(&state, parse_id(&id)?).await?;
    Ok(Json(UserResponse { user: user.into() }))
}

#[instrument(skip(state, user, mp))]
pub async fn edit_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    mp: Multipart,
) -> AppResult<Json<MsgResponse>> {
    let target = parse_id(&id)?;
    let form = EditUserForm::from(MultipartForm::read(mp).await?);
    services::edit_user(&state, user, target, form).await?;
    Ok(Json(MsgResponse::new("User updated successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<MsgResponse>> {
    services::forgot_password(&state, payload).await?;
    Ok(Json(MsgResponse::new("Email sent")))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path((token, id)): Path<(String, String)>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<MsgResponse>> {
    services::reset_password(&state, &token, &id, payload).await?;
    Ok(Json(MsgResponse::new("New password saved")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_uses_camel_case() {
        let json = serde_json::to_value(AuthResponse {
            msg: "ok".into(),
            token: "t".into(),
            user_id: uuid::Uuid::nil(),
        })
        .unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("token").is_some());
    }

    #[tokio::test]
    async fn check_user_without_token_returns_null() {
        let state = AppState::fake();
        let Json(body) = check_user(State(state), MaybeAuthUser(None)).await.unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn public_user_hides_secrets() {
        let state = AppState::fake();
        let user = crate::users::services::tests::register_user(&state, "Ana", "ana@mail.com", "1").await;
        let Json(body) = get_user_by_id(State(state), Path(user.id.to_string())).await.unwrap();
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("ana@mail.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("$argon2"));
    }
}

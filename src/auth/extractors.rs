use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Identity, jwt::JwtKeys};
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// Token from `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent; a header without a token counts as
/// unauthenticated.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| AppError::Unauthenticated)?;
    let mut pieces = value.split_whitespace();
    match (pieces.next(), pieces.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token)),
        _ => Err(AppError::Unauthenticated),
    }
}

fn verify(keys: &JwtKeys, token: &str) -> Result<Identity, AppError> {
    keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid token");
        AppError::InvalidToken
    })
}

/// The identity claim of a verified token.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AppError::Unauthenticated)?;
        let keys = JwtKeys::from_ref(state);
        Ok(AuthUser(verify(&keys, token)?))
    }
}

/// Like [`AuthUser`] but a missing header is not an error.
pub struct MaybeAuthUser(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let keys = JwtKeys::from_ref(state);
                Ok(MaybeAuthUser(Some(verify(&keys, token)?)))
            }
        }
    }
}

/// Full user record of the token holder, re-read from the user store.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        match state.users.find_by_id(identity.id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(user_id = %identity.id, "token for unknown user");
                Err(AppError::Unauthenticated)
            }
        }
    }
}

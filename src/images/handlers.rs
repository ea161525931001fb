use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use tracing::{instrument, warn};

use crate::{error::AppError, state::AppState};

const PRESIGN_TTL_SECS: u64 = 10 * 60;

pub fn image_routes() -> Router<AppState> {
    Router::new().route("/images/*key", get(get_image))
}

/// Redirects to a short-lived URL for the stored object.
#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    match state.storage.presign_get(&key, PRESIGN_TTL_SECS).await {
        Ok(url) => Ok(Redirect::temporary(&url)),
        Err(e) => {
            warn!(error = %e, %key, "presign failed");
            Err(AppError::NotFound("Image"))
        }
    }
}

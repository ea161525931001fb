//! Error type shared by every handler.
//!
//! Business-rule failures keep the status codes existing clients rely on,
//! including the 422 used for both validation and ownership failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or blank field. Only the first violation is reported.
    #[error("{0}")]
    Validation(String),

    #[error("This category does not exist")]
    UnknownCategory,

    #[error("Invalid ID")]
    InvalidIdentifier,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Access denied")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Oops, something went wrong! Please try again later")]
    Forbidden,

    #[error("You have already scheduled a visit with this pet")]
    AlreadyScheduled,

    #[error("You cannot schedule a visit with your own pet")]
    SelfScheduleForbidden,

    #[error("This pet has already been adopted")]
    PetUnavailable,

    #[error("Someone else scheduled a visit at the same time, please retry")]
    ScheduleConflict,

    #[error("Please use another email")]
    DuplicateEmail,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("There is no user registered with this email")]
    UnknownEmail,

    #[error("Invalid password")]
    WrongPassword,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Reset token expired, please request a new one")]
    ResetTokenExpired,

    #[error("Cannot send forgot password email")]
    MailDelivery(#[source] anyhow::Error),

    #[error("Internal server error")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken
            | AppError::InvalidResetToken
            | AppError::ResetTokenExpired
            | AppError::MailDelivery(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Machine-readable counterpart of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::UnknownCategory => "unknown_category",
            AppError::InvalidIdentifier => "invalid_identifier",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden => "forbidden",
            AppError::AlreadyScheduled => "already_scheduled",
            AppError::SelfScheduleForbidden => "self_schedule_forbidden",
            AppError::PetUnavailable => "pet_unavailable",
            AppError::ScheduleConflict => "schedule_conflict",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::PasswordMismatch => "password_mismatch",
            AppError::UnknownEmail => "unknown_email",
            AppError::WrongPassword => "wrong_password",
            AppError::InvalidResetToken => "invalid_reset_token",
            AppError::ResetTokenExpired => "reset_token_expired",
            AppError::MailDelivery(_) => "mail_delivery",
            AppError::Storage(_) => "storage_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(e) => error!(error = ?e, "storage failure"),
            AppError::MailDelivery(e) => error!(error = ?e, "mail delivery failure"),
            _ => {}
        }
        let body = json!({ "msg": self.to_string(), "kind": self.kind() });
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Parses a path identifier, reporting malformed values as `InvalidIdentifier`.
pub fn parse_id(raw: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|_| AppError::InvalidIdentifier)
}

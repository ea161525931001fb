use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use crate::images::form::{MultipartForm, UploadItem};

/// Request body for user registration. Every field is optional on the wire so
/// presence can be reported field by field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Multipart profile edit; `image` is the optional new profile picture.
#[derive(Debug, Default)]
pub struct EditUserForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub image: Option<UploadItem>,
}

impl From<MultipartForm> for EditUserForm {
    fn from(mut form: MultipartForm) -> Self {
        Self {
            name: form.take_text("name"),
            email: form.take_text("email"),
            phone: form.take_text("phone"),
            password: form.take_text("password"),
            confirm_password: form.take_text("confirmPassword"),
            image: form.take_files("image").into_iter().next(),
        }
    }
}

/// Returned after login or registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub msg: String,
    pub token: String,
    pub user_id: Uuid,
}

/// Public part of the user returned to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub image: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            image: u.image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

use anyhow::Context;
use rand::{distributions::Alphanumeric, Rng};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{EditUserForm, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
    repo::EmailTaken,
    repo_types::User,
};
use crate::{
    auth::{
        jwt::JwtKeys,
        password::{ensure_confirmed, hash_password, verify_password},
    },
    error::{AppError, AppResult},
    images::services::{delete_images, upload_images},
    mailer::password_reset_message,
    state::AppState,
    validation::{email, required, required_raw},
};

const RESET_TOKEN_LEN: usize = 40;

fn issue_token(st: &AppState, user: &User) -> AppResult<String> {
    Ok(JwtKeys::from(&st.config.jwt).issue(&user.identity())?)
}

/// A lost race on the email unique key still reads as `DuplicateEmail`.
fn store_error(err: anyhow::Error) -> AppError {
    if err.is::<EmailTaken>() {
        AppError::DuplicateEmail
    } else {
        AppError::Storage(err)
    }
}

/// Blank multipart fields count as absent.
fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Registers a user and logs them in. Returns the stored user and a token.
pub async fn register(st: &AppState, req: RegisterRequest) -> AppResult<(User, String)> {
    let name = required(req.name, "Name is required")?;
    let phone = required(req.phone, "Phone is required")?;
    let email = email(req.email, "Email is required")?;
    let password = required_raw(req.password.as_deref(), "Password is required")?;
    let confirm = required_raw(
        req.confirm_password.as_deref(),
        "Password confirmation is required",
    )?;
    ensure_confirmed(&password, &confirm)?;
    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        phone,
        password_hash: hash_password(&password)?,
        image: None,
        password_reset_token: None,
        password_reset_expires: None,
        created_at: now,
        updated_at: now,
    };
    st.users.insert(&user).await.map_err(store_error)?;
    let token = issue_token(st, &user)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, token))
}

/// Unknown emails and wrong passwords are reported separately.
pub async fn login(st: &AppState, req: LoginRequest) -> AppResult<(User, String)> {
    let email = required(req.email, "Email is required")?.to_lowercase();
    let password = required_raw(req.password.as_deref(), "Password is required")?;

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::UnknownEmail);
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::WrongPassword);
    }

    let token = issue_token(st, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

pub async fn get_user(st: &AppState, id: Uuid) -> AppResult<User> {
    st.users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Applies a profile edit. Name, email and phone must always be resent; the
/// password changes only when both password fields are given and match.
pub async fn edit_user(
    st: &AppState,
    mut user: User,
    target_id: Uuid,
    form: EditUserForm,
) -> AppResult<User> {
    if target_id != user.id {
        warn!(user_id = %user.id, %target_id, "edit of another user's profile");
        return Err(AppError::Forbidden);
    }

    let name = required(form.name, "Name is required")?;
    let new_email = email(form.email, "Email is required")?;
    if new_email != user.email && st.users.find_by_email(&new_email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }
    let phone = required(form.phone, "Phone is required")?;

    let new_hash = match (non_blank(form.password), non_blank(form.confirm_password)) {
        (None, None) => None,
        (Some(p), Some(c)) => {
            ensure_confirmed(&p, &c)?;
            Some(hash_password(&p)?)
        }
        _ => return Err(AppError::PasswordMismatch),
    };

    let uploaded = match form.image {
        Some(image) => upload_images(st, "users", user.id, vec![image]).await?.pop(),
        None => None,
    };
    let replaced = match &uploaded {
        Some(key) => std::mem::replace(&mut user.image, Some(key.clone())),
        None => None,
    };

    user.name = name;
    user.email = new_email;
    user.phone = phone;
    if let Some(hash) = new_hash {
        user.password_hash = hash;
    }
    user.updated_at = OffsetDateTime::now_utc();
    // the old picture goes only once the record points at the new one
    if let Err(e) = st.users.save(&user).await {
        if let Some(key) = uploaded {
            delete_images(st, &[key]).await;
        }
        return Err(store_error(e));
    }
    if let Some(old) = replaced {
        delete_images(st, &[old]).await;
    }

    info!(user_id = %user.id, "user updated");
    Ok(user)
}

fn random_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Stores a fresh one-hour reset token on the user and mails the reset link.
pub async fn forgot_password(st: &AppState, req: ForgotPasswordRequest) -> AppResult<()> {
    let email = required(req.email, "Email is required")?.to_lowercase();
    let Some(mut user) = st.users.find_by_email(&email).await? else {
        return Err(AppError::UnknownEmail);
    };

    let token = random_reset_token();
    let now = OffsetDateTime::now_utc();
    user.password_reset_token = Some(token.clone());
    user.password_reset_expires =
        Some(now + TimeDuration::minutes(st.config.reset_token_ttl_minutes));
    user.updated_at = now;
    st.users.save(&user).await?;

    let mail = &st.config.mail;
    let message = password_reset_message(&user.email, &mail.from, &mail.reset_link_base, &token, user.id);
    st.mailer
        .send(message)
        .await
        .context("send password reset mail")
        .map_err(AppError::MailDelivery)?;

    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

/// Sets a new password when `token` matches the stored, unexpired reset token.
/// The token is cleared on success.
pub async fn reset_password(
    st: &AppState,
    token: &str,
    raw_id: &str,
    req: ResetPasswordRequest,
) -> AppResult<()> {
    let password = required_raw(req.password.as_deref(), "Password is required")?;
    let confirm = required_raw(
        req.confirm_password.as_deref(),
        "Password confirmation is required",
    )?;
    ensure_confirmed(&password, &confirm)?;

    let id = crate::error::parse_id(raw_id)?;
    let mut user = get_user(st, id).await?;

    if user.password_reset_token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "reset with wrong token");
        return Err(AppError::InvalidResetToken);
    }
    let now = OffsetDateTime::now_utc();
    match user.password_reset_expires {
        Some(expires) if now <= expires => {}
        _ => return Err(AppError::ResetTokenExpired),
    }

    user.password_hash = hash_password(&password)?;
    user.password_reset_token = None;
    user.password_reset_expires = None;
    user.updated_at = now;
    st.users.save(&user).await?;

    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn register_req(name: &str, email: &str, phone: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            phone: Some(phone.into()),
            email: Some(email.into()),
            password: Some("s3cret-pass".into()),
            confirm_password: Some("s3cret-pass".into()),
        }
    }

    pub(crate) async fn register_user(st: &AppState, name: &str, email: &str, phone: &str) -> User {
        register(st, register_req(name, email, phone)).await.unwrap().0
    }

    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::{storage::MemoryStorage, users::repo::UserStore};

    /// Delegates to a real store. `save` can be made to fail, and email
    /// lookups can be made to miss, as when a concurrent insert lands between
    /// the uniqueness check and the write.
    struct FlakyUsers {
        inner: Arc<dyn UserStore>,
        fail_save: bool,
        blind_email_lookup: bool,
    }

    #[async_trait]
    impl UserStore for FlakyUsers {
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            if self.blind_email_lookup {
                return Ok(None);
            }
            self.inner.find_by_email(email).await
        }
        async fn insert(&self, user: &User) -> anyhow::Result<()> {
            self.inner.insert(user).await
        }
        async fn save(&self, user: &User) -> anyhow::Result<()> {
            anyhow::ensure!(!self.fail_save, "connection reset by peer");
            self.inner.save(user).await
        }
    }

    fn png() -> crate::images::form::UploadItem {
        crate::images::form::UploadItem {
            body: bytes::Bytes::from_static(b"png"),
            content_type: "image/png".into(),
        }
    }

    fn validation_msg(err: AppError) -> String {
        match err {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn edit_form(user: &User) -> EditUserForm {
        EditUserForm {
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            phone: Some(user.phone.clone()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_stores_hash_and_returns_valid_token() {
        let st = AppState::fake();
        let (user, token) = register(&st, register_req("Ana", "Ana@Mail.com", "555-0100"))
            .await
            .unwrap();

        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "ana@mail.com");
        assert_ne!(stored.password_hash, "s3cret-pass");
        assert!(verify_password("s3cret-pass", &stored.password_hash).unwrap());

        let identity = JwtKeys::from(&st.config.jwt).verify(&token).unwrap();
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.name, "Ana");
    }

    #[tokio::test]
    async fn register_reports_first_missing_field_only() {
        let st = AppState::fake();
        let err = register(&st, RegisterRequest::default()).await.unwrap_err();
        assert_eq!(validation_msg(err), "Name is required");

        let req = RegisterRequest { name: Some("Ana".into()), ..Default::default() };
        assert_eq!(validation_msg(register(&st, req).await.unwrap_err()), "Phone is required");

        let req = RegisterRequest {
            name: Some("Ana".into()),
            phone: Some("1".into()),
            email: Some("a@b.io".into()),
            password: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(
            validation_msg(register(&st, req).await.unwrap_err()),
            "Password confirmation is required"
        );
    }

    #[tokio::test]
    async fn register_rejects_mismatch_and_duplicates() {
        let st = AppState::fake();
        let mut req = register_req("Ana", "ana@mail.com", "1");
        req.confirm_password = Some("other".into());
        assert!(matches!(register(&st, req).await, Err(AppError::PasswordMismatch)));

        register_user(&st, "Ana", "ana@mail.com", "1").await;
        let dup = register(&st, register_req("Bia", "ANA@mail.com", "2")).await;
        assert!(matches!(dup, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_email_from_wrong_password() {
        let st = AppState::fake();
        let user = register_user(&st, "Ana", "ana@mail.com", "1").await;

        let unknown = login(
            &st,
            LoginRequest { email: Some("nobody@mail.com".into()), password: Some("x".into()) },
        )
        .await;
        assert!(matches!(unknown, Err(AppError::UnknownEmail)));

        let wrong = login(
            &st,
            LoginRequest { email: Some("ana@mail.com".into()), password: Some("nope".into()) },
        )
        .await;
        assert!(matches!(wrong, Err(AppError::WrongPassword)));

        let (logged, token) = login(
            &st,
            LoginRequest {
                email: Some("ana@mail.com".into()),
                password: Some("s3cret-pass".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged.id, user.id);
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn login_requires_fields() {
        let st = AppState::fake();
        let err = login(&st, LoginRequest::default()).await.unwrap_err();
        assert_eq!(validation_msg(err), "Email is required");
    }

    #[tokio::test]
    async fn edit_user_updates_profile_and_optional_password() {
        let st = AppState::fake();
        let user = register_user(&st, "Ana", "ana@mail.com", "1").await;
        let old_hash = user.password_hash.clone();

        let mut form = edit_form(&user);
        form.name = Some("Ana Maria".into());
        form.phone = Some("999".into());
        let edited = edit_user(&st, user.clone(), user.id, form).await.unwrap();
        assert_eq!(edited.name, "Ana Maria");
        assert_eq!(edited.password_hash, old_hash);

        let mut form = edit_form(&edited);
        form.password = Some("new-pass".into());
        form.confirm_password = Some("new-pass".into());
        let edited = edit_user(&st, edited.clone(), user.id, form).await.unwrap();
        let stored = st.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.phone, "999");
        assert!(verify_password("new-pass", &stored.password_hash).unwrap());

        let mut form = edit_form(&edited);
        form.password = Some("a".into());
        assert!(matches!(
            edit_user(&st, edited, user.id, form).await,
            Err(AppError::PasswordMismatch)
        ));
    }

    #[tokio::test]
    async fn edit_user_checks_email_uniqueness_only_on_change() {
        let st = AppState::fake();
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;
        register_user(&st, "Bia", "bia@mail.com", "2").await;

        // keeping the same email is fine
        assert!(edit_user(&st, ana.clone(), ana.id, edit_form(&ana)).await.is_ok());

        let mut form = edit_form(&ana);
        form.email = Some("bia@mail.com".into());
        assert!(matches!(
            edit_user(&st, ana.clone(), ana.id, form).await,
            Err(AppError::DuplicateEmail)
        ));
    }

    #[tokio::test]
    async fn edit_user_rejects_other_target() {
        let st = AppState::fake();
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;
        let form = edit_form(&ana);
        assert!(matches!(
            edit_user(&st, ana, Uuid::new_v4(), form).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn edit_user_stores_image() {
        let st = AppState::fake();
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;
        let mut form = edit_form(&ana);
        form.image = Some(crate::images::form::UploadItem {
            body: bytes::Bytes::from_static(b"png"),
            content_type: "image/png".into(),
        });
        let edited = edit_user(&st, ana.clone(), ana.id, form).await.unwrap();
        let key = edited.image.unwrap();
        assert!(key.starts_with(&format!("users/{}/", ana.id)));
        assert!(st.storage.presign_get(&key, 60).await.is_ok());
    }

    #[tokio::test]
    async fn failed_profile_save_keeps_old_image_and_drops_new_upload() {
        let storage = Arc::new(MemoryStorage::new());
        let st = AppState { storage: storage.clone(), ..AppState::fake() };
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;
        let mut form = edit_form(&ana);
        form.image = Some(png());
        let ana = edit_user(&st, ana.clone(), ana.id, form).await.unwrap();
        let old_key = ana.image.clone().unwrap();

        let broken = AppState {
            users: Arc::new(FlakyUsers {
                inner: st.users.clone(),
                fail_save: true,
                blind_email_lookup: false,
            }),
            ..st.clone()
        };
        let mut form = edit_form(&ana);
        form.image = Some(png());
        let err = edit_user(&broken, ana.clone(), ana.id, form).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(storage.len().await, 1);
        assert!(storage.contains(&old_key).await);
        let stored = st.users.find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.image.as_deref(), Some(old_key.as_str()));

        // a successful replacement removes the previous object
        let mut form = edit_form(&ana);
        form.image = Some(png());
        let edited = edit_user(&st, ana.clone(), ana.id, form).await.unwrap();
        assert_eq!(storage.len().await, 1);
        assert!(!storage.contains(&old_key).await);
        assert!(storage.contains(&edited.image.unwrap()).await);
    }

    #[tokio::test]
    async fn email_taken_between_check_and_write_is_duplicate_email() {
        let st = AppState::fake();
        register_user(&st, "Ana", "ana@mail.com", "1").await;
        let bia = register_user(&st, "Bia", "bia@mail.com", "2").await;
        let racing = AppState {
            users: Arc::new(FlakyUsers {
                inner: st.users.clone(),
                fail_save: false,
                blind_email_lookup: true,
            }),
            ..st.clone()
        };

        let res = register(&racing, register_req("Caio", "ana@mail.com", "3")).await;
        assert!(matches!(res, Err(AppError::DuplicateEmail)));

        let mut form = edit_form(&bia);
        form.email = Some("ana@mail.com".into());
        assert!(matches!(
            edit_user(&racing, bia.clone(), bia.id, form).await,
            Err(AppError::DuplicateEmail)
        ));
        let stored = st.users.find_by_id(bia.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "bia@mail.com");
    }

    #[tokio::test]
    async fn forgot_then_reset_password_is_one_shot() {
        let st = AppState::fake();
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;

        forgot_password(&st, ForgotPasswordRequest { email: Some("ana@mail.com".into()) })
            .await
            .unwrap();
        let stored = st.users.find_by_id(ana.id).await.unwrap().unwrap();
        let token = stored.password_reset_token.clone().unwrap();
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        let expires = stored.password_reset_expires.unwrap();
        assert!(expires > OffsetDateTime::now_utc() + TimeDuration::minutes(59));

        let req = || ResetPasswordRequest {
            password: Some("brand-new".into()),
            confirm_password: Some("brand-new".into()),
        };
        let id = ana.id.to_string();
        assert!(matches!(
            reset_password(&st, "wrong", &id, req()).await,
            Err(AppError::InvalidResetToken)
        ));
        reset_password(&st, &token, &id, req()).await.unwrap();

        let stored = st.users.find_by_id(ana.id).await.unwrap().unwrap();
        assert!(verify_password("brand-new", &stored.password_hash).unwrap());
        assert!(stored.password_reset_token.is_none());
        assert!(matches!(
            reset_password(&st, &token, &id, req()).await,
            Err(AppError::InvalidResetToken)
        ));
    }

    #[tokio::test]
    async fn reset_password_rejects_expired_token() {
        let st = AppState::fake();
        let mut ana = register_user(&st, "Ana", "ana@mail.com", "1").await;
        ana.password_reset_token = Some("tok".into());
        ana.password_reset_expires = Some(OffsetDateTime::now_utc() - TimeDuration::minutes(1));
        st.users.save(&ana).await.unwrap();

        let res = reset_password(
            &st,
            "tok",
            &ana.id.to_string(),
            ResetPasswordRequest {
                password: Some("x".into()),
                confirm_password: Some("x".into()),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::ResetTokenExpired)));
    }

    #[tokio::test]
    async fn reset_password_validates_before_lookup() {
        let st = AppState::fake();
        let res = reset_password(&st, "tok", "not-an-id", ResetPasswordRequest::default()).await;
        assert_eq!(validation_msg(res.unwrap_err()), "Password is required");

        let res = reset_password(
            &st,
            "tok",
            "not-an-id",
            ResetPasswordRequest {
                password: Some("x".into()),
                confirm_password: Some("x".into()),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::InvalidIdentifier)));
    }

    #[tokio::test]
    async fn forgot_password_mails_reset_link() {
        let mailer = std::sync::Arc::new(crate::mailer::RecordingMailer::default());
        let st = AppState { mailer: mailer.clone(), ..AppState::fake() };
        let ana = register_user(&st, "Ana", "ana@mail.com", "1").await;

        forgot_password(&st, ForgotPasswordRequest { email: Some("ANA@mail.com".into()) })
            .await
            .unwrap();

        let token = st
            .users
            .find_by_id(ana.id)
            .await
            .unwrap()
            .unwrap()
            .password_reset_token
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@mail.com");
        assert_eq!(sent[0].from, st.config.mail.from);
        assert!(sent[0]
            .body
            .contains(&format!("/users/reset_password/{}/{}", token, ana.id)));
    }

    #[tokio::test]
    async fn forgot_password_reports_mail_failure() {
        let mailer = crate::mailer::RecordingMailer { failing: true, ..Default::default() };
        let st = AppState { mailer: std::sync::Arc::new(mailer), ..AppState::fake() };
        register_user(&st, "Ana", "ana@mail.com", "1").await;

        let res = forgot_password(&st, ForgotPasswordRequest { email: Some("ana@mail.com".into()) }).await;
        let err = res.unwrap_err();
        assert!(matches!(err, AppError::MailDelivery(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forgot_password_unknown_email() {
        let st = AppState::fake();
        let res = forgot_password(&st, ForgotPasswordRequest { email: Some("x@y.io".into()) }).await;
        assert!(matches!(res, Err(AppError::UnknownEmail)));
    }
}

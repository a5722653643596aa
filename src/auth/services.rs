use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    AuthResponse, LoginRequest, PublicUser, RegisterRequest, ResetPasswordRequest,
    UpdateProfileRequest,
};
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};
use crate::{
    error::AppError,
    state::AppState,
    users::{NewUser, ProfileChanges, User},
};

const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 60;
const RESET_TOKEN_BYTES: usize = 32;
const THEMES: &[&str] = &["light", "dark"];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    if len > PASSWORD_MAX {
        return Err(AppError::BadRequest(format!(
            "password must be at most {PASSWORD_MAX} characters"
        )));
    }
    Ok(())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn invalid_reset_token() -> AppError {
    AppError::BadRequest("Invalid or expired reset token".into())
}

fn issue(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    Ok(AuthResponse {
        token,
        user: PublicUser {
            id: user.id,
            email: user.email,
        },
    })
}

/// 32 bytes from the OS RNG, hex encoded.
pub(crate) fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("email must be an email".into()));
    }
    validate_password(&req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    // a concurrent registration still loses on the unique constraint
    let user = state
        .users
        .create(NewUser {
            email,
            password_hash,
            firstname: req.firstname.map(|s| s.trim().to_string()),
            lastname: req.lastname.map(|s| s.trim().to_string()),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue(state, user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&req.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue(state, user)
}

pub async fn check_email(state: &AppState, email: &str) -> Result<bool, AppError> {
    let email = normalize_email(email);
    Ok(state.users.find_by_email(&email).await?.is_some())
}

pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    if let Some(theme) = req.theme.as_deref() {
        if !THEMES.contains(&theme) {
            return Err(AppError::BadRequest(format!(
                "theme must be one of: {}",
                THEMES.join(", ")
            )));
        }
    }
    let changes = ProfileChanges {
        firstname: req.firstname.map(|s| s.trim().to_string()),
        lastname: req.lastname.map(|s| s.trim().to_string()),
        avatar: req.avatar.map(|s| s.trim().to_string()),
        theme: req.theme,
    };
    let user = state
        .users
        .update_profile(user_id, changes)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

/// Stores a fresh reset token and emits the link. Unknown emails succeed silently.
pub async fn forgot_password(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };

    let ttl = state.config.reset_token_ttl;
    let token = generate_reset_token();
    let expiry = TimeDuration::try_from(ttl)
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .context("reset token lifetime overflows the expiry timestamp")?;
    state.users.set_reset_token(user.id, &token, expiry).await?;

    // stands in for email delivery
    let link = format!("{}/reset-password/{}", state.config.frontend_url, token);
    info!(
        user_id = %user.id,
        email = %user.email,
        link = %link,
        expires_in_minutes = ttl.as_secs() / 60,
        "password reset link issued"
    );
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    req: ResetPasswordRequest,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(invalid_reset_token());
    }

    let Some(user) = state.users.find_by_reset_token(token).await? else {
        warn!("unknown reset token");
        return Err(invalid_reset_token());
    };

    match user.reset_password_expiry {
        Some(expiry) if expiry > now => {}
        _ => {
            warn!(user_id = %user.id, "expired reset token");
            return Err(invalid_reset_token());
        }
    }

    validate_password(&req.password)?;
    let password_hash = hash_password(&req.password)?;
    let applied = state
        .users
        .complete_password_reset(user.id, token, now, &password_hash)
        .await?;
    if !applied {
        warn!(user_id = %user.id, "reset token consumed or replaced concurrently");
        return Err(invalid_reset_token());
    }

    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::MemoryHabitStore;
    use crate::users::{MemoryUserStore, UserStore};
    use std::sync::Arc;

    fn state_with_store() -> (AppState, Arc<MemoryUserStore>) {
        let users = Arc::new(MemoryUserStore::new());
        let state = AppState::from_parts(
            AppState::fake().config,
            users.clone(),
            Arc::new(MemoryHabitStore::new()),
        );
        (state, users)
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            firstname: None,
            lastname: None,
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    async fn reset_token_for(users: &MemoryUserStore, email: &str) -> String {
        users
            .find_by_email(email)
            .await
            .unwrap()
            .and_then(|u| u.reset_password_token)
            .expect("token stored")
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
    }

    #[test]
    fn reset_tokens_are_64_hex_chars_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn register_issues_token_for_new_user() {
        let (state, _) = state_with_store();
        let res = register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        assert_eq!(res.user.email, "a@b.com");
        let claims = JwtKeys::from_ref(&state).verify(&res.token).unwrap();
        assert_eq!(claims.sub, res.user.id);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_without_new_row() {
        let (state, users) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let err = register(&state, register_req(" A@b.com", "other-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(users.user_count().await, 1);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (state, users) = state_with_store();
        let bad_email = register(&state, register_req("nope", "secret123")).await;
        assert!(matches!(bad_email, Err(AppError::BadRequest(_))));
        let short = register(&state, register_req("a@b.com", "12345")).await;
        assert!(matches!(short, Err(AppError::BadRequest(_))));
        let long = register(&state, register_req("a@b.com", &"x".repeat(61))).await;
        assert!(matches!(long, Err(AppError::BadRequest(_))));
        assert_eq!(users.user_count().await, 0);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (state, _) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();

        let wrong_pw = login(&state, login_req("a@b.com", "wrong-pass")).await.unwrap_err();
        let unknown = login(&state, login_req("ghost@b.com", "secret123")).await.unwrap_err();
        assert!(matches!(wrong_pw, AppError::Unauthorized(_)));
        assert!(matches!(unknown, AppError::Unauthorized(_)));
        assert_eq!(wrong_pw.to_string(), unknown.to_string());

        let ok = login(&state, login_req("A@B.com", "secret123")).await.unwrap();
        assert_eq!(ok.user.email, "a@b.com");
    }

    #[tokio::test]
    async fn check_email_reflects_registration() {
        let (state, _) = state_with_store();
        assert!(!check_email(&state, "used@x.com").await.unwrap());
        register(&state, register_req("used@x.com", "secret123")).await.unwrap();
        assert!(check_email(&state, "used@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn update_profile_rejects_unknown_theme() {
        let (state, _) = state_with_store();
        let res = register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let req = UpdateProfileRequest {
            theme: Some("neon".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&state, res.user.id, req).await,
            Err(AppError::BadRequest(_))
        ));

        let req = UpdateProfileRequest {
            firstname: Some(" Ada ".into()),
            theme: Some("dark".into()),
            ..Default::default()
        };
        let user = update_profile(&state, res.user.id, req).await.unwrap();
        assert_eq!(user.firstname.as_deref(), Some("Ada"));
        assert_eq!(user.theme, "dark");
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let (state, users) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        forgot_password(&state, "a@b.com", now).await.unwrap();
        let token = reset_token_for(&users, "a@b.com").await;

        let req = || ResetPasswordRequest {
            token: token.clone(),
            password: "brand-new".into(),
        };
        reset_password(&state, req(), now).await.unwrap();
        let again = reset_password(&state, req(), now).await.unwrap_err();
        assert!(matches!(again, AppError::BadRequest(_)));

        assert!(login(&state, login_req("a@b.com", "secret123")).await.is_err());
        assert!(login(&state, login_req("a@b.com", "brand-new")).await.is_ok());
    }

    #[tokio::test]
    async fn reset_token_expires_after_an_hour() {
        let (state, users) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let issued = OffsetDateTime::now_utc();
        forgot_password(&state, "a@b.com", issued).await.unwrap();
        let token = reset_token_for(&users, "a@b.com").await;

        let req = ResetPasswordRequest {
            token: token.clone(),
            password: "brand-new".into(),
        };
        let late = issued + TimeDuration::hours(1);
        assert!(reset_password(&state, req, late).await.is_err());

        let req = ResetPasswordRequest {
            token,
            password: "brand-new".into(),
        };
        let in_time = issued + TimeDuration::minutes(59);
        reset_password(&state, req, in_time).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_resets_with_one_token_let_exactly_one_through() {
        let (state, users) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        forgot_password(&state, "a@b.com", now).await.unwrap();
        let token = reset_token_for(&users, "a@b.com").await;

        let attempts: Vec<_> = ["first-new", "second-new"]
            .into_iter()
            .map(|password| {
                let state = state.clone();
                let req = ResetPasswordRequest {
                    token: token.clone(),
                    password: password.into(),
                };
                tokio::spawn(async move { reset_password(&state, req, now).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for attempt in attempts {
            outcomes.push(attempt.await.unwrap());
        }
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::BadRequest(_)))));

        let first = login(&state, login_req("a@b.com", "first-new")).await.is_ok();
        let second = login(&state, login_req("a@b.com", "second-new")).await.is_ok();
        assert!(first ^ second);
    }

    #[tokio::test]
    async fn oversized_reset_ttl_is_an_error_not_a_panic() {
        let (mut state, _) = state_with_store();
        register(&state, register_req("a@b.com", "secret123")).await.unwrap();
        let mut config = (*state.config).clone();
        config.reset_token_ttl = std::time::Duration::from_secs(u64::MAX);
        state.config = Arc::new(config);

        let err = forgot_password(&state, "a@b.com", OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_silent() {
        let (state, users) = state_with_store();
        forgot_password(&state, "ghost@b.com", OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(users.user_count().await, 0);
    }

    #[tokio::test]
    async fn reset_rejects_blank_and_unknown_tokens() {
        let (state, _) = state_with_store();
        let now = OffsetDateTime::now_utc();
        for token in ["", "   ", "deadbeef"] {
            let req = ResetPasswordRequest {
                token: token.into(),
                password: "brand-new".into(),
            };
            assert!(matches!(
                reset_password(&state, req, now).await,
                Err(AppError::BadRequest(_))
            ));
        }
    }
}

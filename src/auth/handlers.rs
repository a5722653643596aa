use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, CheckEmailRequest, CheckEmailResponse, ForgotPasswordRequest,
            LoginRequest, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest,
            UserProfile,
        },
        jwt::AuthUser,
        services,
    },
    error::AppError,
    extract::JsonBody,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // older clients post here
        .route("/auth/logIn", post(login))
        .route("/auth/checkEmail", post(check_email))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).patch(update_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    services::login(&state, payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn check_email(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CheckEmailRequest>,
) -> Result<Json<CheckEmailResponse>, AppError> {
    let exists = services::check_email(&state, &payload.email).await?;
    Ok(Json(CheckEmailResponse { exists }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    services::forgot_password(&state, &payload.email, OffsetDateTime::now_utc()).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    services::reset_password(&state, payload, OffsetDateTime::now_utc()).await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = services::update_profile(&state, user_id, payload).await?;
    Ok(Json(user.into()))
}

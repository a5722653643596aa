use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateHabitRequest, HabitResponse, Pagination, UpdateHabitRequest};
use crate::{auth::jwt::AuthUser, error::AppError, extract::JsonBody, state::AppState};

pub fn habit_routes() -> Router<AppState> {
    Router::new()
        .route("/habits", get(list_habits).post(create_habit))
        .route(
            "/habits/:id",
            get(get_habit).patch(update_habit).delete(delete_habit),
        )
}

fn not_found() -> AppError {
    AppError::NotFound("Habit not found".into())
}

#[instrument(skip(state, body))]
pub async fn create_habit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(body): JsonBody<CreateHabitRequest>,
) -> Result<(StatusCode, HeaderMap, Json<HabitResponse>), AppError> {
    let (title, description) = body.validate()?;
    let habit = state.habits.create(user_id, &title, &description).await?;
    info!(%user_id, habit_id = %habit.id, "habit created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/habits/{}", habit.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(habit.into())))
}

#[instrument(skip(state))]
pub async fn list_habits(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<HabitResponse>>, AppError> {
    let (limit, offset) = p.resolve()?;
    let habits = state.habits.list_by_user(user_id, limit, offset).await?;
    Ok(Json(habits.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_habit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<HabitResponse>, AppError> {
    let habit = state.habits.find(user_id, id).await?.ok_or_else(not_found)?;
    Ok(Json(habit.into()))
}

#[instrument(skip(state, body))]
pub async fn update_habit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateHabitRequest>,
) -> Result<Json<HabitResponse>, AppError> {
    let changes = body.validate()?;
    let habit = state
        .habits
        .update(user_id, id, changes)
        .await?
        .ok_or_else(not_found)?;
    info!(%user_id, habit_id = %habit.id, "habit updated");
    Ok(Json(habit.into()))
}

#[instrument(skip(state))]
pub async fn delete_habit(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.habits.delete(user_id, id).await? {
        return Err(not_found());
    }
    info!(%user_id, habit_id = %id, "habit deleted");
    Ok(StatusCode::NO_CONTENT)
}

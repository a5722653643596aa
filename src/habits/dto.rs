use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Habit, HabitChanges};
use crate::error::AppError;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub title: String,
    pub description: String,
}

impl CreateHabitRequest {
    /// Trims both fields and rejects blanks.
    pub fn validate(self) -> Result<(String, String), AppError> {
        Ok((
            non_blank("title", &self.title)?,
            non_blank("description", &self.description)?,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateHabitRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateHabitRequest {
    pub fn validate(self) -> Result<HabitChanges, AppError> {
        Ok(HabitChanges {
            title: self.title.as_deref().map(|t| non_blank("title", t)).transpose()?,
            description: self
                .description
                .as_deref()
                .map(|d| non_blank("description", d))
                .transpose()?,
        })
    }
}

fn non_blank(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} should not be empty")));
    }
    Ok(value.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Habit> for HabitResponse {
    fn from(h: Habit) -> Self {
        Self {
            id: h.id,
            title: h.title,
            description: h.description,
            created_at: h.created_at,
            updated_at: h.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    /// Clamps `limit` into range; a negative `offset` is a client error.
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        if self.offset < 0 {
            return Err(AppError::BadRequest("offset must not be less than 0".into()));
        }
        Ok((self.limit.clamp(1, MAX_LIMIT), self.offset))
    }
}

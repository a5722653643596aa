use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Habit, HabitChanges};
use crate::error::StoreError;

/// Every query is scoped to the owning user.
#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> Result<Habit, StoreError>;
    /// Newest first.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Habit>, StoreError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Habit>, StoreError>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> Result<Option<Habit>, StoreError>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgHabitStore {
    db: PgPool,
}

impl PgHabitStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HabitStore for PgHabitStore {
    async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> Result<Habit, StoreError> {
        let habit = sqlx::query_as::<_, Habit>(
            r#"
            INSERT INTO habits (user_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, description, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .fetch_one(&self.db)
        .await?;
        Ok(habit)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Habit>, StoreError> {
        let rows = sqlx::query_as::<_, Habit>(
            r#"
            SELECT id, user_id, title, description, created_at, updated_at
            FROM habits
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Habit>, StoreError> {
        let habit = sqlx::query_as::<_, Habit>(
            r#"
            SELECT id, user_id, title, description, created_at, updated_at
            FROM habits
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(habit)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> Result<Option<Habit>, StoreError> {
        let habit = sqlx::query_as::<_, Habit>(
            r#"
            UPDATE habits
               SET title       = COALESCE($3, title),
                   description = COALESCE($4, description),
                   updated_at  = now()
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(changes.title)
        .bind(changes.description)
        .fetch_optional(&self.db)
        .await?;
        Ok(habit)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

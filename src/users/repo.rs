use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileChanges, User};
use crate::error::StoreError;

const USER_COLUMNS: &str = "id, email, password_hash, firstname, lastname, avatar, theme, \
    reset_password_token, reset_password_expiry, created_at, updated_at";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Fails with `StoreError::DuplicateEmail` when the email is taken.
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError>;
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError>;
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    /// Stores the new hash and clears the reset token in a single write, but
    /// only while `token` is still the user's live token at `now`. Returns
    /// `false` when another reset or a newer forgot-password got there first.
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, firstname, lastname)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.firstname)
        .bind(&new.lastname)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET firstname  = COALESCE($2, firstname),
                   lastname   = COALESCE($3, lastname),
                   avatar     = COALESCE($4, avatar),
                   theme      = COALESCE($5, theme),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.firstname)
        .bind(changes.lastname)
        .bind(changes.avatar)
        .bind(changes.theme)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_password_token = $2, reset_password_expiry = $3, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(expiry)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_password_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   reset_password_token = NULL,
                   reset_password_expiry = NULL,
                   updated_at = now()
             WHERE id = $1
               AND reset_password_token = $3
               AND reset_password_expiry > $4
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(token)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

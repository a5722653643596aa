use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::UserStore;
use super::repo_types::{NewUser, ProfileChanges, User, DEFAULT_THEME};
use crate::error::StoreError;

/// Process-local user table for `DB_TYPE=memory` and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        // check and insert under one write lock, like the unique index would
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            firstname: new.firstname,
            lastname: new.lastname,
            avatar: None,
            theme: DEFAULT_THEME.to_string(),
            reset_password_token: None,
            reset_password_expiry: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.firstname {
            user.firstname = Some(v);
        }
        if let Some(v) = changes.lastname {
            user.lastname = Some(v);
        }
        if let Some(v) = changes.avatar {
            user.avatar = Some(v);
        }
        if let Some(v) = changes.theme {
            user.theme = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.reset_password_token = Some(token.to_string());
            user.reset_password_expiry = Some(expiry);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.reset_password_token.as_deref() == Some(token))
            .cloned())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        let live = user.reset_password_token.as_deref() == Some(token)
            && user.reset_password_expiry.is_some_and(|expiry| expiry > now);
        if !live {
            return Ok(false);
        }
        user.password_hash = password_hash.to_string();
        user.reset_password_token = None;
        user.reset_password_expiry = None;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }
}

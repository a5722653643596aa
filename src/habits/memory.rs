use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::HabitStore;
use super::repo_types::{Habit, HabitChanges};
use crate::error::StoreError;

/// Habits kept in insertion order; listing walks it backwards.
#[derive(Default)]
pub struct MemoryHabitStore {
    habits: RwLock<Vec<Habit>>,
}

impl MemoryHabitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HabitStore for MemoryHabitStore {
    async fn create(
        &self,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> Result<Habit, StoreError> {
        let now = OffsetDateTime::now_utc();
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.habits.write().await.push(habit.clone());
        Ok(habit)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Habit>, StoreError> {
        let habits = self.habits.read().await;
        Ok(habits
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Habit>, StoreError> {
        let habits = self.habits.read().await;
        Ok(habits
            .iter()
            .find(|h| h.id == id && h.user_id == user_id)
            .cloned())
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> Result<Option<Habit>, StoreError> {
        let mut habits = self.habits.write().await;
        let Some(habit) = habits
            .iter_mut()
            .find(|h| h.id == id && h.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            habit.title = title;
        }
        if let Some(description) = changes.description {
            habit.description = description;
        }
        habit.updated_at = OffsetDateTime::now_utc();
        Ok(Some(habit.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut habits = self.habits.write().await;
        let before = habits.len();
        habits.retain(|h| !(h.id == id && h.user_id == user_id));
        Ok(habits.len() < before)
    }
}

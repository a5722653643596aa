mod dto;
pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use memory::MemoryHabitStore;
pub use repo::{HabitStore, PgHabitStore};

pub fn router() -> Router<AppState> {
    handlers::habit_routes()
}

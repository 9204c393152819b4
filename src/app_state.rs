//! Application state shared across all handlers.

use crate::config::Config;
use crate::database::{DatabasePool, TodoRepository};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: DatabasePool,
    /// Application configuration
    pub config: Config,
    /// To-do item data access
    pub todo_items: TodoRepository,
}

impl AppState {
    pub fn new(db: DatabasePool, config: Config) -> Self {
        Self {
            todo_items: TodoRepository::new(db.clone()),
            db,
            config,
        }
    }
}

impl axum::extract::FromRef<AppState> for TodoRepository {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.todo_items.clone()
    }
}

impl axum::extract::FromRef<AppState> for Config {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

use crate::config::{AppConfig, DbKind};
use crate::db;
use crate::habits::{HabitStore, MemoryHabitStore, PgHabitStore};
use crate::users::{MemoryUserStore, PgUserStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub habits: Arc<dyn HabitStore>,
}

impl AppState {
    /// Connects the configured backend. Postgres gets its migrations applied here.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        match config.database.kind {
            DbKind::Postgres => {
                let pool = db::connect(&config.database).await?;
                db::migrate(&pool).await?;
                Ok(Self::from_parts(
                    config,
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgHabitStore::new(pool)),
                ))
            }
            DbKind::Memory => {
                tracing::warn!("DB_TYPE=memory: data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        habits: Arc<dyn HabitStore>,
    ) -> Self {
        Self {
            config,
            users,
            habits,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryHabitStore::new()),
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{DatabaseConfig, JwtConfig};
        use std::time::Duration;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database: DatabaseConfig {
                kind: DbKind::Memory,
                url: String::new(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret".into(),
                ttl: Duration::from_secs(60 * 60),
            },
            frontend_url: "http://localhost:5173".into(),
            reset_token_ttl: Duration::from_secs(60 * 60),
        });
        Self::in_memory(config)
    }
}

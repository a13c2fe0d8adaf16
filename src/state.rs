use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::store::{EventStore, MemoryStore, PgStore, UserStore};
use std::sync::Arc;

/// Per-process context handed to every handler. Nothing in here is mutated
/// after startup; writes go through the stores.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub events: Arc<dyn EventStore>,
    pub keys: Arc<JwtKeys>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (users, events): (Arc<dyn UserStore>, Arc<dyn EventStore>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let pg = Arc::new(PgStore::connect(url, config.db_max_connections).await?);
                    tracing::info!("connected to postgres");
                    let users: Arc<dyn UserStore> = pg.clone();
                    let events: Arc<dyn EventStore> = pg;
                    (users, events)
                }
                None => {
                    tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
                    let mem = Arc::new(MemoryStore::new());
                    let users: Arc<dyn UserStore> = mem.clone();
                    let events: Arc<dyn EventStore> = mem;
                    (users, events)
                }
            };

        Ok(Self::from_parts(users, events, config))
    }

    pub fn from_parts(
        users: Arc<dyn UserStore>,
        events: Arc<dyn EventStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            users,
            events,
            keys: Arc::new(JwtKeys::new(&config.jwt)),
            config: Arc::new(config),
        }
    }

    /// Memory-backed state with a fixed test secret.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                algorithm: jsonwebtoken::Algorithm::HS256,
                ttl_minutes: 30,
            },
        };
        let mem = Arc::new(MemoryStore::new());
        Self::from_parts(mem.clone(), mem, config)
    }
}

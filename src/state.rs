use std::sync::Arc;

use argon2::Params;

use crate::auth::password::{Argon2Hasher, CredentialHasher};
use crate::auth::services::RegistrationService;
use crate::config::{AppConfig, DbConfig};
use crate::db;
use crate::users::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registration: RegistrationService,
}

impl AppState {
    /// Connect to Postgres, apply migrations and wire the production components.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db).await?;
        db::migrate(&pool).await?;

        let users = Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>;
        let hasher = Arc::new(Argon2Hasher::default()) as Arc<dyn CredentialHasher>;
        Ok(Self::from_parts(Arc::new(config), users, hasher))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let registration = RegistrationService::new(users, hasher, config.store_timeout());
        Self {
            config,
            registration,
        }
    }

    /// In-memory store and a low-cost hasher, for tests and local experiments.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            db: DbConfig {
                host: "localhost".into(),
                port: 5432,
                user: None,
                password: None,
                name: None,
                sslmode: None,
                max_connections: 1,
                acquire_timeout_secs: 1,
            },
            app_host: "127.0.0.1".into(),
            app_port: 0,
            store_timeout_ms: 5000,
        });

        let params = Params::new(1024, 1, 1, None).expect("valid argon2 params");
        let users = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
        let hasher = Arc::new(Argon2Hasher::new(params)) as Arc<dyn CredentialHasher>;
        Self::from_parts(config, users, hasher)
    }
}

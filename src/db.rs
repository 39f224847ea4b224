use std::time::Duration;

use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use tracing::info;

use crate::config::DbConfig;

/// Translate `DbConfig` into connect options. Unset fields keep sqlx's `PG*` defaults.
pub fn connect_options(cfg: &DbConfig) -> anyhow::Result<PgConnectOptions> {
    let mut opts = PgConnectOptions::new().host(&cfg.host).port(cfg.port);
    if let Some(user) = &cfg.user {
        opts = opts.username(user);
    }
    if let Some(password) = &cfg.password {
        opts = opts.password(password);
    }
    if let Some(name) = &cfg.name {
        opts = opts.database(name);
    }
    if let Some(mode) = &cfg.sslmode {
        let mode = mode
            .parse::<PgSslMode>()
            .with_context(|| format!("invalid DB_SSLMODE `{mode}`"))?;
        opts = opts.ssl_mode(mode);
    }
    Ok(opts)
}

/// Open the pool. The first connection is established eagerly so a bad
/// configuration fails at startup rather than on the first request.
pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .connect_with(connect_options(cfg)?)
        .await
        .context("connect to database")?;
    info!(host = %cfg.host, port = cfg.port, "connected to database");
    Ok(pool)
}

/// Apply `migrations/`. Uniqueness of user identities lives in that schema,
/// so the server must not start without it.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

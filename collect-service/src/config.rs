use std::env;

use collect_core::RetentionConfig;

/// Process-level configuration: connection strings, bind address, and the
/// single Metrics Pass-Through administrator identity, layered on top of
/// the shared [`RetentionConfig`] tunables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub alertmanager_base_url: String,

    /// Plaintext admin secret, read once at startup and hashed before being
    /// held in [`crate::app_state::AppState`] — never logged, never stored
    /// plaintext past this struct's construction.
    pub admin_id: String,
    pub admin_secret: String,

    pub retention: RetentionConfig,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            redis_url: env::var("REDIS_URL")
                .map_err(|_| anyhow::anyhow!("REDIS_URL must be set"))?,
            alertmanager_base_url: env::var("ALERTMANAGER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9093".to_string()),
            admin_id: env::var("ADMIN_ID")
                .map_err(|_| anyhow::anyhow!("ADMIN_ID must be set"))?,
            admin_secret: env::var("ADMIN_SECRET")
                .map_err(|_| anyhow::anyhow!("ADMIN_SECRET must be set"))?,
            retention: RetentionConfig::from_env(),
        })
    }
}

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod validation;

pub use db::DbPool;

use auth::TokenIssuer;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Build the shared state. `config` must have passed
    /// [`Config::validate`].
    pub fn new(config: Config, db: DbPool) -> anyhow::Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("JWT secret is not configured"))?;
        let tokens = TokenIssuer::new(secret, config.auth.token_ttl_days);
        Ok(Self { config, db, tokens })
    }
}

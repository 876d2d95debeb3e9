pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod validators;

pub use error::{AppError, Result};

use actix_middleware::SlidingWindowLimiter;
use config::Config;
use db::SharedUserStore;
use jwt_security::{Clock, TokenService};
use services::{AccountService, Gatekeeper, PresenceCache, StreamKeyRegistry, Sweeper};
use std::sync::Arc;

/// Shared services handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedUserStore,
    pub tokens: Arc<TokenService>,
    pub presence: Arc<PresenceCache>,
    pub gatekeeper: Arc<Gatekeeper>,
    pub accounts: Arc<AccountService>,
    pub rate_limiter: Arc<SlidingWindowLimiter>,
}

impl AppState {
    /// Wire the services together. Fails when the token service rejects its
    /// configuration.
    pub fn build(config: Config, store: SharedUserStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let tokens = Arc::new(TokenService::new(config.jwt.token_config(), clock.clone())?);
        let presence = Arc::new(PresenceCache::new(
            config.streaming.stream_timeout(),
            clock.clone(),
        ));
        let registry = Arc::new(StreamKeyRegistry::new(
            store.clone(),
            presence.clone(),
            clock.clone(),
        ));
        let gatekeeper = Arc::new(Gatekeeper::new(
            store.clone(),
            presence.clone(),
            clock,
            config.streaming.hls_base_url.clone(),
        ));
        let accounts = Arc::new(AccountService::new(store.clone(), registry, tokens.clone()));
        let rate_limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            presence,
            gatekeeper,
            accounts,
            rate_limiter,
        })
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.presence.clone(),
            self.rate_limiter.clone(),
            self.tokens.clone(),
        )
    }
}

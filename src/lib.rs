pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;

use config::Config;
use std::sync::Arc;
use tracing::warn;

use crate::auth::SessionTokens;
use crate::db::DocumentStore;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// `None` when no signing secret is configured; protected routes then
    /// fail with a server error.
    pub tokens: Option<SessionTokens>,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        let tokens = config
            .auth
            .secret()
            .map(|secret| SessionTokens::new(secret, config.auth.token_ttl_secs));

        if tokens.is_none() {
            warn!("No token secret configured; token issuance and protected routes will fail");
        }

        Self { store, tokens }
    }
}

// Application state shared across all modules

use std::sync::Arc;

use super::config::AppConfig;
use crate::auth::{FederatedAuth, LocalAuth, TokenCodec, UserStore};
use crate::services::IdentityProvider;

/// Application state: configuration, the token codec and the two auth flows.
///
/// Everything here is immutable after startup, so handlers share it through a
/// plain `Arc` without a lock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: TokenCodec,
    pub local_auth: LocalAuth,
    pub federated_auth: FederatedAuth,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: UserStore, provider: Arc<dyn IdentityProvider>) -> Self {
        let tokens = TokenCodec::new(&config.jwt_secret);
        let local_auth = LocalAuth::new(store.clone(), tokens.clone());
        let federated_auth = FederatedAuth::new(provider, store, tokens.clone());

        Self {
            config,
            tokens,
            local_auth,
            federated_auth,
        }
    }
}

use std::sync::Arc;

use crate::auth::{
    AuthorizationGate, CsrfGuard, KeyProvider, PasswordHasher, PersonalAccessTokenManager,
    PolicyEngine, RefreshSession, SessionCookieManager, TokenCodec,
};
use crate::config::AuthConfig;
use crate::store::{TokenStore, UserStore};

/// Shared application state, registered once as `web::Data<AppState>`.
///
/// Holds no session data of its own: every component reads and writes through
/// the stores.
pub struct AppState {
    pub config: AuthConfig,
    pub hasher: PasswordHasher,
    pub users: Arc<dyn UserStore>,
    pub sessions: RefreshSession,
    pub tokens: PersonalAccessTokenManager,
    pub cookies: SessionCookieManager,
    pub gate: AuthorizationGate,
}

impl AppState {
    pub fn new(
        config: AuthConfig,
        keys: Arc<KeyProvider>,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        policy: Arc<dyn PolicyEngine>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::from_config(keys, &config));
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        let csrf = CsrfGuard::new(&config.csrf_secret, &config.csrf_header);

        let sessions = RefreshSession::new(codec.clone(), hasher, users.clone());
        let personal = PersonalAccessTokenManager::new(codec.clone(), hasher, tokens);
        let cookies = SessionCookieManager::new(!config.is_local(), csrf.clone());
        let gate = AuthorizationGate::new(
            config.clone(),
            codec,
            users.clone(),
            personal.clone(),
            csrf,
            policy,
        );

        Self {
            config,
            hasher,
            users,
            sessions,
            tokens: personal,
            cookies,
            gate,
        }
    }
}

pub mod cookies;
pub mod csrf;
pub mod extractors;
pub mod gate;
pub mod keys;
pub mod middleware;
pub mod password;
pub mod personal;
pub mod policy;
pub mod role;
pub mod session;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use cookies::SessionCookieManager;
pub use csrf::CsrfGuard;
pub use extractors::Authenticated;
pub use gate::{AuthorizationGate, CredentialSource, GateOutcome, GateRequest, RequestContext};
pub use keys::KeyProvider;
pub use middleware::AuthMiddleware;
pub use password::PasswordHasher;
pub use personal::PersonalAccessTokenManager;
pub use policy::{PolicyEngine, RolePolicy};
pub use role::Role;
pub use session::{RefreshSession, SessionTokens};
pub use token::{Claims, IssuedToken, TokenCodec, TokenKind};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// User's email address.
    #[validate(email)]
    pub email: String,
    /// User's password.
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username for the new account.
    /// Must be between 3 and 32 characters, alphanumeric, and can include underscores or hyphens.
    #[validate(
        length(min = 3, max = 32),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Body of `POST /auth/refresh`. When absent, the `refresh_token` cookie is used.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Response structure after a successful login, registration or refresh.
///
/// The same token strings are also set as cookies.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i32,
}

impl AuthResponse {
    pub fn new(user_id: i32, tokens: &SessionTokens) -> Self {
        Self {
            access_token: tokens.access.token.clone(),
            refresh_token: tokens.refresh.token.clone(),
            user_id,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{AuthConfig, DEFAULT_EXEMPT_PATHS};
    use crate::error::AppError;
    use crate::models::{NewUser, User};
    use crate::store::UserStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::path::PathBuf;
    use std::sync::Arc;

    pub fn test_keys() -> KeyProvider {
        KeyProvider::from_pem(
            include_bytes!("../../tests/fixtures/ed25519_private.pem"),
            include_bytes!("../../tests/fixtures/ed25519_public.pem"),
        )
        .unwrap()
    }

    /// A second key pair, for forging signatures.
    pub fn other_keys() -> KeyProvider {
        KeyProvider::from_pem(
            include_bytes!("../../tests/fixtures/other_private.pem"),
            include_bytes!("../../tests/fixtures/other_public.pem"),
        )
        .unwrap()
    }

    pub fn test_codec() -> TokenCodec {
        TokenCodec::new(
            Arc::new(test_keys()),
            "taskforge-test",
            Duration::minutes(15),
            Duration::days(14),
        )
    }

    pub fn test_hasher() -> PasswordHasher {
        PasswordHasher::new(4)
    }

    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            issuer: "taskforge-test".into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 14,
            private_key_path: PathBuf::from("tests/fixtures/ed25519_private.pem"),
            public_key_path: PathBuf::from("tests/fixtures/ed25519_public.pem"),
            csrf_secret: "csrf-test-secret".into(),
            csrf_header: "X-CSRF-Token".into(),
            environment: "test".into(),
            bcrypt_cost: 4,
            store_timeout_secs: 10,
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// A user store that fails every call, or never answers when `hang` is set.
    pub struct BrokenStore {
        pub hang: bool,
    }

    impl BrokenStore {
        async fn fail<T>(&self) -> Result<T, AppError> {
            if self.hang {
                futures::future::pending::<()>().await;
            }
            Err(AppError::ServiceUnavailable("connection refused".into()))
        }
    }

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn ping(&self) -> Result<(), AppError> {
            self.fail().await
        }
        async fn find_by_id(&self, _id: i32) -> Result<Option<User>, AppError> {
            self.fail().await
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
            self.fail().await
        }
        async fn create(&self, _user: NewUser) -> Result<User, AppError> {
            self.fail().await
        }
        async fn record_login(&self, _id: i32, _hash: &str, _at: DateTime<Utc>) -> Result<(), AppError> {
            self.fail().await
        }
        async fn swap_refresh_hash(
            &self,
            _id: i32,
            _expected: &str,
            _new_hash: &str,
            _at: DateTime<Utc>,
        ) -> Result<bool, AppError> {
            self.fail().await
        }
        async fn record_logout(&self, _id: i32, _at: DateTime<Utc>) -> Result<(), AppError> {
            self.fail().await
        }
        async fn update_status(
            &self,
            _id: i32,
            _banned: Option<bool>,
            _locked: Option<bool>,
        ) -> Result<User, AppError> {
            self.fail().await
        }
        async fn update_role(&self, _id: i32, _role: Role) -> Result<User, AppError> {
            self.fail().await
        }
    }
}

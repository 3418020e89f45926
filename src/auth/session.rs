use chrono::Utc;
use std::sync::Arc;

use crate::auth::gate::check_account_status;
use crate::auth::password::PasswordHasher;
use crate::auth::token::{IssuedToken, TokenCodec, TokenKind};
use crate::error::AppError;
use crate::models::User;
use crate::store::UserStore;

/// An access/refresh pair handed to the client.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Login, refresh rotation and logout over the user's single stored refresh hash.
///
/// Every refresh token is single use: exchanging it overwrites the stored hash,
/// so presenting it again fails even while its signature and `exp` are still valid.
#[derive(Clone)]
pub struct RefreshSession {
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    users: Arc<dyn UserStore>,
}

impl RefreshSession {
    pub fn new(codec: Arc<TokenCodec>, hasher: PasswordHasher, users: Arc<dyn UserStore>) -> Self {
        Self { codec, hasher, users }
    }

    /// Checks email and password and the account status.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

        if !self.hasher.verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        check_account_status(&user)?;
        Ok(user)
    }

    /// Issues a new pair and stores the hash of the refresh token.
    pub async fn login(&self, user: &User) -> Result<SessionTokens, AppError> {
        let tokens = self.issue_pair(user)?;
        let refresh_hash = self.hasher.hash_token(&tokens.refresh.token)?;
        self.users
            .record_login(user.id, &refresh_hash, Utc::now())
            .await?;
        log::info!("User {} logged in", user.id);
        Ok(tokens)
    }

    /// Exchanges `presented` for a new pair and rotates the stored hash.
    ///
    /// `user` must be freshly loaded so its refresh hash reflects the store.
    pub async fn refresh(&self, user: &User, presented: &str) -> Result<SessionTokens, AppError> {
        let stored_hash = user
            .refresh_token_hash
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| AppError::TokenMismatch("No active session".into()))?;

        if !self.hasher.verify_token(presented, stored_hash)? {
            log::warn!("Refresh token mismatch for user {}", user.id);
            return Err(AppError::TokenMismatch("Refresh token does not match".into()));
        }

        let tokens = self.issue_pair(user)?;
        let new_hash = self.hasher.hash_token(&tokens.refresh.token)?;

        // Conditional on the hash we verified against: a concurrent exchange of the
        // same token can only win once.
        let swapped = self
            .users
            .swap_refresh_hash(user.id, stored_hash, &new_hash, Utc::now())
            .await?;
        if !swapped {
            log::warn!("Concurrent refresh lost the rotation race for user {}", user.id);
            return Err(AppError::TokenMismatch("Refresh token already used".into()));
        }

        Ok(tokens)
    }

    /// Validates a presented refresh token, loads its owner and rotates.
    pub async fn exchange(&self, presented: &str) -> Result<(User, SessionTokens), AppError> {
        let claims = self.codec.validate(presented)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AppError::TokenInvalid("Not a refresh token".into()));
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::TokenInvalid("Unknown subject".into()))?;
        check_account_status(&user)?;

        let tokens = self.refresh(&user, presented).await?;
        Ok((user, tokens))
    }

    /// Clears the stored hash; any outstanding refresh token stops working.
    pub async fn logout(&self, user: &User) -> Result<(), AppError> {
        self.users.record_logout(user.id, Utc::now()).await?;
        log::info!("User {} logged out", user.id);
        Ok(())
    }

    fn issue_pair(&self, user: &User) -> Result<SessionTokens, AppError> {
        Ok(SessionTokens {
            access: self.codec.generate_access(user.id, &[user.role])?,
            refresh: self.codec.generate_refresh(user.id)?,
        })
    }
}

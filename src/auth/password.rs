use crate::error::AppError;
use bcrypt::{hash, verify};
use sha2::{Digest, Sha256};

/// Adaptive one-way hashing for passwords and for stored bearer secrets
/// (refresh tokens and personal access tokens).
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        verify(password, hashed_password)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }

    /// Hashes a signed token for storage.
    ///
    /// bcrypt only reads the first 72 bytes of its input and tokens issued to the
    /// same user share a long common prefix, so the token is digested first.
    pub fn hash_token(&self, token: &str) -> Result<String, AppError> {
        hash(token_digest(token), self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash token: {}", e)))
    }

    /// `Ok(false)` on mismatch; an unreadable stored hash also counts as a mismatch.
    pub fn verify_token(&self, token: &str, hashed_token: &str) -> Result<bool, AppError> {
        match verify(token_digest(token), hashed_token) {
            Ok(matches) => Ok(matches),
            Err(e) => {
                log::warn!("Stored token hash could not be parsed: {}", e);
                Ok(false)
            }
        }
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

use crate::auth::keys::KeyProvider;
use crate::auth::Role;
use crate::config::AuthConfig;
use crate::error::AppError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Which kind of credential a token is. Serialized as the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Personal,
}

/// Represents the claims encoded within a signed token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: i32,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Unique token id. For personal tokens this is the stored record id.
    pub jti: Uuid,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs and validates access, refresh and personal tokens with EdDSA.
pub struct TokenCodec {
    keys: Arc<KeyProvider>,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(keys: Arc<KeyProvider>, issuer: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);
        validation.validate_nbf = true;

        Self {
            keys,
            issuer: issuer.to_string(),
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    pub fn from_config(keys: Arc<KeyProvider>, config: &AuthConfig) -> Self {
        Self::new(
            keys,
            &config.issuer,
            Duration::minutes(config.access_ttl_minutes),
            Duration::days(config.refresh_ttl_days),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Short-lived API credential carrying the caller's roles.
    pub fn generate_access(&self, subject: i32, roles: &[Role]) -> Result<IssuedToken, AppError> {
        self.issue(TokenKind::Access, subject, Uuid::new_v4(), self.access_ttl, roles)
    }

    /// Long-lived credential that can only be exchanged for a new pair. No extra claims.
    pub fn generate_refresh(&self, subject: i32) -> Result<IssuedToken, AppError> {
        self.issue(TokenKind::Refresh, subject, Uuid::new_v4(), self.refresh_ttl, &[])
    }

    /// User-issued credential with a caller-chosen lifetime. `id` becomes the `jti`.
    pub fn generate_personal(
        &self,
        subject: i32,
        id: Uuid,
        ttl: Duration,
        roles: &[Role],
    ) -> Result<IssuedToken, AppError> {
        self.issue(TokenKind::Personal, subject, id, ttl, roles)
    }

    /// Verifies signature, issuer, `exp` and `nbf`.
    ///
    /// Malformed, forged, expired and not-yet-valid tokens all fail with `TokenInvalid`.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, self.keys.decoding_key(), &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::from)
    }

    fn issue(
        &self,
        kind: TokenKind,
        subject: i32,
        jti: Uuid,
        ttl: Duration,
        roles: &[Role],
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal("Token lifetime out of range".into()))?;

        let claims = Claims {
            sub: subject,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expiration.timestamp(),
            jti,
            kind,
            roles: roles.to_vec(),
        };

        let token = encode(&Header::new(Algorithm::EdDSA), &claims, self.keys.encoding_key())
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }
}

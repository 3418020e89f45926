use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A stored personal access token. Only the hash of the token is kept.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonalAccessToken {
    /// Unique identifier; also the `jti` claim of the issued token.
    pub id: Uuid,
    pub user_id: i32,
    /// Unique among the user's non-revoked tokens.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub revoked: bool,
}

/// Body of `POST /api/tokens`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateTokenRequest {
    /// Display name, unique per user.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Expiry date in `YYYY-MM-DD` form; the token expires at midnight UTC of that day.
    pub expires_at: String,
}

/// Token metadata as returned by reads. Never contains the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenView {
    pub id: Uuid,
    pub user_id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Creation response: metadata plus the plaintext token, shown exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedToken {
    #[serde(flatten)]
    pub metadata: TokenView,
    pub token: String,
}

impl From<&PersonalAccessToken> for TokenView {
    fn from(pat: &PersonalAccessToken) -> Self {
        Self {
            id: pat.id,
            user_id: pat.user_id,
            name: pat.name.clone(),
            created_at: pat.created_at,
            expires_at: pat.expires_at,
            revoked: pat.revoked,
        }
    }
}

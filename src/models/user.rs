use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::Role;

/// An account, including the session fields used by refresh rotation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub banned: bool,
    pub locked: bool,
    /// Hash of the single refresh token currently accepted; `None` when logged out.
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_logout_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Body of `PUT /api/users/{id}/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub banned: Option<bool>,
    pub locked: Option<bool>,
}

/// Body of `PUT /api/users/{id}/role`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

impl User {
    pub fn new(id: i32, input: NewUser) -> Self {
        Self {
            id,
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            role: input.role,
            banned: false,
            locked: false,
            refresh_token_hash: None,
            last_login_at: None,
            last_logout_at: None,
            last_refresh_at: None,
            created_at: Utc::now(),
        }
    }
}

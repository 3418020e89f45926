//! Persistence interfaces for accounts and personal access tokens.
//!
//! All session truth lives behind these traits. Nothing in the auth layer keeps
//! its own copy of a refresh hash or token record between requests, so
//! correctness under concurrency rests on the atomicity of the operations below.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{NewUser, PersonalAccessToken, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Round trip to the backing store, for health reporting.
    async fn ping(&self) -> Result<(), AppError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict` when the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// Stores the refresh hash issued at login and stamps `last_login_at`.
    async fn record_login(&self, id: i32, refresh_hash: &str, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Replaces the refresh hash only if it still equals `expected`, stamping
    /// `last_refresh_at`. Returns `false` when another writer got there first.
    async fn swap_refresh_hash(
        &self,
        id: i32,
        expected: &str,
        new_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Clears the refresh hash and stamps `last_logout_at`.
    async fn record_logout(&self, id: i32, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Fails with `NotExist` for an unknown id.
    async fn update_status(
        &self,
        id: i32,
        banned: Option<bool>,
        locked: Option<bool>,
    ) -> Result<User, AppError>;

    /// Fails with `NotExist` for an unknown id.
    async fn update_role(&self, id: i32, role: Role) -> Result<User, AppError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fails with `Conflict` when the user already has a non-revoked token with that name.
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, AppError>;

    /// All of a user's tokens, newest first.
    async fn find_by_user(&self, user_id: i32) -> Result<Vec<PersonalAccessToken>, AppError>;

    /// The user's non-revoked token with this name, if any.
    async fn find_active_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<PersonalAccessToken>, AppError>;

    /// Flips `revoked` from false to true. Returns `false` if it was already revoked
    /// or the id is unknown.
    async fn revoke(&self, id: Uuid) -> Result<bool, AppError>;
}

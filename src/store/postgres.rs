use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{NewUser, PersonalAccessToken, User};
use crate::store::{TokenStore, UserStore};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, banned, locked, \
     refresh_token_hash, last_login_at, last_logout_at, last_refresh_at, created_at";

const TOKEN_COLUMNS: &str = "id, user_id, name, created_at, expires_at, token_hash, revoked";

/// Postgres-backed stores. The schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict("Email already registered".into())
                } else {
                    AppError::from(e)
                }
            })
    }

    async fn record_login(&self, id: i32, refresh_hash: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, last_login_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(refresh_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotExist(format!("User {} does not exist", id)));
        }
        Ok(())
    }

    async fn swap_refresh_hash(
        &self,
        id: i32,
        expected: &str,
        new_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, last_refresh_at = $4 \
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(new_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_logout(&self, id: i32, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET refresh_token_hash = NULL, last_logout_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: i32,
        banned: Option<bool>,
        locked: Option<bool>,
    ) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET banned = COALESCE($2, banned), locked = COALESCE($3, locked) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(banned)
            .bind(locked)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotExist(format!("User {} does not exist", id)))
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<User, AppError> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {}", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotExist(format!("User {} does not exist", id)))
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO personal_access_tokens (id, user_id, name, created_at, expires_at, token_hash, revoked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(pat.id)
        .bind(pat.user_id)
        .bind(&pat.name)
        .bind(pat.created_at)
        .bind(pat.expires_at)
        .bind(&pat.token_hash)
        .bind(pat.revoked)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("A token named '{}' already exists", pat.name))
            } else {
                AppError::from(e)
            }
        })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, AppError> {
        let sql = format!("SELECT {} FROM personal_access_tokens WHERE id = $1", TOKEN_COLUMNS);
        let token = sqlx::query_as::<_, PersonalAccessToken>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    async fn find_by_user(&self, user_id: i32) -> Result<Vec<PersonalAccessToken>, AppError> {
        let sql = format!(
            "SELECT {} FROM personal_access_tokens WHERE user_id = $1 ORDER BY created_at DESC",
            TOKEN_COLUMNS
        );
        let tokens = sqlx::query_as::<_, PersonalAccessToken>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tokens)
    }

    async fn find_active_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<PersonalAccessToken>, AppError> {
        let sql = format!(
            "SELECT {} FROM personal_access_tokens WHERE user_id = $1 AND name = $2 AND NOT revoked",
            TOKEN_COLUMNS
        );
        let token = sqlx::query_as::<_, PersonalAccessToken>(&sql)
            .bind(user_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE personal_access_tokens SET revoked = TRUE WHERE id = $1 AND NOT revoked",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

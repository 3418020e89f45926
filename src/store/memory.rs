use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::AppError;
use crate::models::{NewUser, PersonalAccessToken, User};
use crate::store::{TokenStore, UserStore};

/// In-process implementation of both stores, for local runs and tests.
///
/// Each operation holds the write lock for its whole read-modify-write, which
/// gives the same atomicity as the conditional updates in `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_user_id: i32,
    users: HashMap<i32, User>,
    tokens: HashMap<Uuid, PersonalAccessToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_user(id: i32) -> AppError {
    AppError::NotExist(format!("User {} does not exist", id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        state.next_user_id += 1;
        let user = User::new(state.next_user_id, user);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn record_login(&self, id: i32, refresh_hash: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.refresh_token_hash = Some(refresh_hash.to_string());
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn swap_refresh_hash(
        &self,
        id: i32,
        expected: &str,
        new_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        if user.refresh_token_hash.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(new_hash.to_string());
        user.last_refresh_at = Some(at);
        Ok(true)
    }

    async fn record_logout(&self, id: i32, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.refresh_token_hash = None;
        user.last_logout_at = Some(at);
        Ok(())
    }

    async fn update_status(
        &self,
        id: i32,
        banned: Option<bool>,
        locked: Option<bool>,
    ) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        if let Some(banned) = banned {
            user.banned = banned;
        }
        if let Some(locked) = locked {
            user.locked = locked;
        }
        Ok(user.clone())
    }

    async fn update_role(&self, id: i32, role: Role) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.role = role;
        Ok(user.clone())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert(&self, pat: &PersonalAccessToken) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let duplicate = state
            .tokens
            .values()
            .any(|t| t.user_id == pat.user_id && t.name == pat.name && !t.revoked);
        if duplicate {
            return Err(AppError::Conflict(format!(
                "A token named '{}' already exists",
                pat.name
            )));
        }
        state.tokens.insert(pat.id, pat.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonalAccessToken>, AppError> {
        Ok(self.state.read().await.tokens.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: i32) -> Result<Vec<PersonalAccessToken>, AppError> {
        let state = self.state.read().await;
        let mut tokens: Vec<_> = state
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn find_active_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<PersonalAccessToken>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .tokens
            .values()
            .find(|t| t.user_id == user_id && t.name == name && !t.revoked)
            .cloned())
    }

    async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        match state.tokens.get_mut(&id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "alice".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::User,
        }
    }

    fn pat(user_id: i32, name: &str) -> PersonalAccessToken {
        let now = Utc::now();
        PersonalAccessToken {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            created_at: now,
            expires_at: now + Duration::days(1),
            token_hash: "hash".into(),
            revoked: false,
        }
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.create(new_user("a@b.com")).await.unwrap();
        let err = store.create(new_user("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_swap_refresh_hash_only_replaces_expected_value() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@b.com")).await.unwrap();
        store.record_login(user.id, "h1", Utc::now()).await.unwrap();

        assert!(store.swap_refresh_hash(user.id, "h1", "h2", Utc::now()).await.unwrap());
        // A second writer that read h1 loses.
        assert!(!store.swap_refresh_hash(user.id, "h1", "h3", Utc::now()).await.unwrap());

        let stored = UserStore::find_by_id(&store, user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash.as_deref(), Some("h2"));
        assert!(stored.last_refresh_at.is_some());
    }

    #[actix_rt::test]
    async fn test_logout_clears_hash() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@b.com")).await.unwrap();
        store.record_login(user.id, "h1", Utc::now()).await.unwrap();
        store.record_logout(user.id, Utc::now()).await.unwrap();

        let stored = UserStore::find_by_id(&store, user.id).await.unwrap().unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert!(stored.last_logout_at.is_some());
        assert!(!store.swap_refresh_hash(user.id, "h1", "h2", Utc::now()).await.unwrap());
    }

    #[actix_rt::test]
    async fn test_token_names_are_unique_among_active_tokens() {
        let store = MemoryStore::new();
        let first = pat(1, "ci");
        store.insert(&first).await.unwrap();

        assert!(matches!(store.insert(&pat(1, "ci")).await, Err(AppError::Conflict(_))));
        // Another user may use the same name.
        store.insert(&pat(2, "ci")).await.unwrap();

        // Once revoked, the name is free again.
        assert!(store.revoke(first.id).await.unwrap());
        store.insert(&pat(1, "ci")).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_revoke_happens_once() {
        let store = MemoryStore::new();
        let token = pat(1, "ci");
        store.insert(&token).await.unwrap();

        assert!(store.revoke(token.id).await.unwrap());
        assert!(!store.revoke(token.id).await.unwrap());
        assert!(!store.revoke(Uuid::new_v4()).await.unwrap());
    }
}

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::auth::token::{Claims, TokenCodec};
use crate::error::AppError;
use crate::models::{CreatedToken, PersonalAccessToken, TokenView};
use crate::store::TokenStore;

/// Lifecycle of personal access tokens: create, look up, revoke and check at
/// request time. The store record is authoritative for revocation and expiry.
#[derive(Clone)]
pub struct PersonalAccessTokenManager {
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    tokens: Arc<dyn TokenStore>,
}

impl PersonalAccessTokenManager {
    pub fn new(codec: Arc<TokenCodec>, hasher: PasswordHasher, tokens: Arc<dyn TokenStore>) -> Self {
        Self { codec, hasher, tokens }
    }

    /// Issues a token for the session's subject with the session's roles.
    ///
    /// The plaintext is only ever part of the returned value.
    pub async fn create(
        &self,
        session: &Claims,
        name: &str,
        expires_at: &str,
    ) -> Result<CreatedToken, AppError> {
        if self.tokens.find_active_by_name(session.sub, name).await?.is_some() {
            return Err(AppError::Conflict(format!("A token named '{}' already exists", name)));
        }

        let expires_at = parse_expiry(expires_at)?;
        let now = Utc::now();
        if expires_at <= now {
            return Err(AppError::ExpiresAtPast("expires_at must be in the future".into()));
        }

        let id = Uuid::new_v4();
        let issued = self
            .codec
            .generate_personal(session.sub, id, expires_at - now, &session.roles)?;

        let record = PersonalAccessToken {
            id,
            user_id: session.sub,
            name: name.to_string(),
            created_at: now,
            expires_at,
            token_hash: self.hasher.hash_token(&issued.token)?,
            revoked: false,
        };
        self.tokens.insert(&record).await?;
        log::info!("User {} created personal access token {}", session.sub, id);

        Ok(CreatedToken {
            metadata: TokenView::from(&record),
            token: issued.token,
        })
    }

    pub async fn read(&self, id: Uuid) -> Result<PersonalAccessToken, AppError> {
        self.tokens
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotExist(format!("Token {} does not exist", id)))
    }

    pub async fn find(&self, user_id: i32) -> Result<Vec<PersonalAccessToken>, AppError> {
        self.tokens.find_by_user(user_id).await
    }

    pub async fn find_one(&self, user_id: i32, name: &str) -> Result<PersonalAccessToken, AppError> {
        self.tokens
            .find_active_by_name(user_id, name)
            .await?
            .ok_or_else(|| AppError::NotExist(format!("Token '{}' does not exist", name)))
    }

    /// Revokes once; revoking an already revoked token is a conflict.
    pub async fn revoke(&self, pat: &PersonalAccessToken) -> Result<(), AppError> {
        if pat.revoked || !self.tokens.revoke(pat.id).await? {
            return Err(AppError::Conflict("Token is already revoked".into()));
        }
        log::info!("Personal access token {} revoked", pat.id);
        Ok(())
    }

    /// Checks a presented token against its stored record: hash first, then
    /// revocation, then the stored expiry.
    pub fn validate_at_request_time(
        &self,
        pat: &PersonalAccessToken,
        presented: &str,
    ) -> Result<(), AppError> {
        if !self.hasher.verify_token(presented, &pat.token_hash)? {
            return Err(AppError::TokenMismatch("Personal access token does not match".into()));
        }
        if pat.revoked {
            return Err(AppError::TokenRevoked("Personal access token was revoked".into()));
        }
        if Utc::now() > pat.expires_at {
            return Err(AppError::TokenExpired("Personal access token has expired".into()));
        }
        Ok(())
    }
}

/// `YYYY-MM-DD`, interpreted as midnight UTC of that day.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::ValidationError(format!("expires_at must be a YYYY-MM-DD date, got '{}'", raw))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::ValidationError("expires_at is out of range".into()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{test_codec, test_hasher};
    use crate::auth::token::TokenKind;
    use crate::auth::Role;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn setup() -> (PersonalAccessTokenManager, Arc<TokenCodec>, Claims) {
        let codec = Arc::new(test_codec());
        let manager =
            PersonalAccessTokenManager::new(codec.clone(), test_hasher(), Arc::new(MemoryStore::new()));
        let session = codec.generate_access(7, &[Role::Admin]).unwrap().claims;
        (manager, codec, session)
    }

    fn in_days(days: i64) -> String {
        (Utc::now() + Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    #[actix_rt::test]
    async fn test_create_returns_plaintext_once() {
        let (manager, codec, session) = setup();
        let created = manager.create(&session, "ci", &in_days(30)).await.unwrap();

        let claims = codec.validate(&created.token).unwrap();
        assert_eq!(claims.kind, TokenKind::Personal);
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.roles, vec![Role::Admin]);
        assert_eq!(claims.jti, created.metadata.id);

        let stored = manager.read(created.metadata.id).await.unwrap();
        assert_ne!(stored.token_hash, created.token);
        assert!(!stored.revoked);
        assert!(manager.validate_at_request_time(&stored, &created.token).is_ok());
    }

    #[actix_rt::test]
    async fn test_duplicate_name_is_a_conflict() {
        let (manager, _codec, session) = setup();
        manager.create(&session, "ci", &in_days(30)).await.unwrap();

        let err = manager.create(&session, "ci", &in_days(60)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_rt::test]
    async fn test_name_is_reusable_after_revoke() {
        let (manager, _codec, session) = setup();
        let created = manager.create(&session, "ci", &in_days(30)).await.unwrap();
        let pat = manager.find_one(7, "ci").await.unwrap();
        assert_eq!(pat.id, created.metadata.id);

        manager.revoke(&pat).await.unwrap();
        assert!(matches!(manager.find_one(7, "ci").await, Err(AppError::NotExist(_))));
        assert!(manager.create(&session, "ci", &in_days(30)).await.is_ok());
        assert_eq!(manager.find(7).await.unwrap().len(), 2);
    }

    #[actix_rt::test]
    async fn test_expiry_must_be_in_the_future() {
        let (manager, _codec, session) = setup();

        let past = manager.create(&session, "old", "2001-01-01").await;
        assert!(matches!(past, Err(AppError::ExpiresAtPast(_))));

        // Midnight today has already passed.
        let today = manager.create(&session, "today", &in_days(0)).await;
        assert!(matches!(today, Err(AppError::ExpiresAtPast(_))));

        let garbage = manager.create(&session, "bad", "next tuesday").await;
        assert!(matches!(garbage, Err(AppError::ValidationError(_))));
    }

    #[actix_rt::test]
    async fn test_revoke_twice_is_a_conflict() {
        let (manager, _codec, session) = setup();
        let created = manager.create(&session, "ci", &in_days(30)).await.unwrap();
        let pat = manager.read(created.metadata.id).await.unwrap();

        manager.revoke(&pat).await.unwrap();
        // Stale copy that still says revoked == false.
        assert!(matches!(manager.revoke(&pat).await, Err(AppError::Conflict(_))));

        let fresh = manager.read(created.metadata.id).await.unwrap();
        assert!(fresh.revoked);
        assert!(matches!(manager.revoke(&fresh).await, Err(AppError::Conflict(_))));
    }

    #[actix_rt::test]
    async fn test_lookups_report_absence() {
        let (manager, _codec, _session) = setup();
        assert!(matches!(manager.read(Uuid::new_v4()).await, Err(AppError::NotExist(_))));
        assert!(matches!(manager.find_one(7, "nope").await, Err(AppError::NotExist(_))));
        assert!(manager.find(7).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_validate_at_request_time() {
        let (manager, _codec, session) = setup();
        let created = manager.create(&session, "ci", &in_days(30)).await.unwrap();
        let pat = manager.read(created.metadata.id).await.unwrap();

        assert!(matches!(
            manager.validate_at_request_time(&pat, "some-other-token"),
            Err(AppError::TokenMismatch(_))
        ));

        let revoked = PersonalAccessToken { revoked: true, ..pat.clone() };
        assert!(matches!(
            manager.validate_at_request_time(&revoked, &created.token),
            Err(AppError::TokenRevoked(_))
        ));

        // The stored expiry wins even though the signed token itself is still valid.
        let elapsed = PersonalAccessToken {
            expires_at: Utc::now() - Duration::minutes(1),
            ..pat
        };
        assert!(matches!(
            manager.validate_at_request_time(&elapsed, &created.token),
            Err(AppError::TokenExpired(_))
        ));
    }
}

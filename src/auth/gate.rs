//! The per-request authorization pipeline.
//!
//! A request walks these stages in order and stops at the first denial:
//!
//! 1. credential present (`Authorization: Bearer` header, else `access_token` cookie)
//! 2. token signature and validity window
//! 3. account loaded by subject (bounded by the store timeout)
//! 4. account status (banned, then locked)
//! 5. CSRF double-submit, for cookie credentials on unsafe methods
//! 6. stored-record checks, for personal access tokens
//! 7. policy decision for the token's roles
//!
//! Exempt paths skip the whole pipeline.

use actix_web::http::Method;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::csrf::CsrfGuard;
use crate::auth::personal::PersonalAccessTokenManager;
use crate::auth::policy::PolicyEngine;
use crate::auth::token::{Claims, TokenCodec, TokenKind};
use crate::auth::Role;
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::models::User;
use crate::store::UserStore;

/// Where the bearer credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    Cookie,
}

/// Credential material extracted from an incoming request.
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub access_cookie: Option<String>,
    pub csrf_cookie: Option<String>,
    pub csrf_header: Option<String>,
}

impl GateRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            bearer: None,
            access_cookie: None,
            csrf_cookie: None,
            csrf_header: None,
        }
    }

    fn credential(&self) -> Option<(&str, CredentialSource)> {
        if let Some(token) = self.bearer.as_deref().filter(|t| !t.is_empty()) {
            return Some((token, CredentialSource::Header));
        }
        self.access_cookie
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|token| (token, CredentialSource::Cookie))
    }
}

/// Everything the pipeline established about an allowed request.
///
/// Populated once by the gate and read by handlers through the `Authenticated`
/// extractor.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates log lines for this request.
    pub request_id: Uuid,
    pub token: Claims,
    pub user: User,
    pub source: CredentialSource,
}

/// Result of running the gate.
#[derive(Debug)]
pub enum GateOutcome {
    Exempt,
    Allowed(Box<RequestContext>),
}

/// Denies banned accounts first, then locked ones.
pub fn check_account_status(user: &User) -> Result<(), AppError> {
    if user.banned {
        return Err(AppError::AccountBanned("Account is banned".into()));
    }
    if user.locked {
        return Err(AppError::AccountLocked("Account is locked".into()));
    }
    Ok(())
}

pub struct AuthorizationGate {
    config: AuthConfig,
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
    personal: PersonalAccessTokenManager,
    csrf: CsrfGuard,
    policy: Arc<dyn PolicyEngine>,
}

impl AuthorizationGate {
    pub fn new(
        config: AuthConfig,
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserStore>,
        personal: PersonalAccessTokenManager,
        csrf: CsrfGuard,
        policy: Arc<dyn PolicyEngine>,
    ) -> Self {
        Self {
            config,
            codec,
            users,
            personal,
            csrf,
            policy,
        }
    }

    pub async fn authorize(&self, request: &GateRequest) -> Result<GateOutcome, AppError> {
        if self.config.is_exempt(&request.path) {
            return Ok(GateOutcome::Exempt);
        }

        let request_id = Uuid::new_v4();
        match self.run(request_id, request).await {
            Ok(context) => {
                log::debug!(
                    "[{}] {} {} allowed for user {}",
                    request_id,
                    request.method,
                    request.path,
                    context.user.id
                );
                Ok(GateOutcome::Allowed(Box::new(context)))
            }
            Err(err) => {
                log::warn!(
                    "[{}] {} {} denied: {}",
                    request_id,
                    request.method,
                    request.path,
                    err
                );
                Err(err)
            }
        }
    }

    async fn run(&self, request_id: Uuid, request: &GateRequest) -> Result<RequestContext, AppError> {
        let (raw, source) = request
            .credential()
            .ok_or_else(|| AppError::TokenInvalid("Missing token".into()))?;

        let token = self.codec.validate(raw)?;
        if token.kind == TokenKind::Refresh {
            return Err(AppError::TokenInvalid("Refresh tokens cannot authorize requests".into()));
        }

        let user = self
            .bounded(self.users.find_by_id(token.sub))
            .await?
            .ok_or_else(|| AppError::TokenInvalid("Unknown subject".into()))?;

        check_account_status(&user)?;

        if CsrfGuard::applies(source, &request.method) {
            self.csrf.verify(
                raw,
                request.csrf_cookie.as_deref(),
                request.csrf_header.as_deref(),
            )?;
        }

        if token.kind == TokenKind::Personal {
            self.check_personal(&token, raw).await?;
        }

        self.check_roles(&token, &user, request).await?;

        Ok(RequestContext {
            request_id,
            token,
            user,
            source,
        })
    }

    async fn check_personal(&self, token: &Claims, raw: &str) -> Result<(), AppError> {
        let pat = match self.bounded(self.personal.read(token.jti)).await {
            Ok(pat) if pat.user_id == token.sub => pat,
            Ok(_) | Err(AppError::NotExist(_)) => {
                return Err(AppError::TokenInvalid("Unknown personal access token".into()))
            }
            Err(err) => return Err(err),
        };
        self.personal.validate_at_request_time(&pat, raw)
    }

    /// Allowed when any of the token's roles is allowed. Roles above the
    /// account's current role are ignored, so a demotion takes effect on
    /// tokens that were issued earlier.
    async fn check_roles(&self, token: &Claims, user: &User, request: &GateRequest) -> Result<(), AppError> {
        let effective: Vec<Role> = token
            .roles
            .iter()
            .copied()
            .filter(|role| user.role.has_role_or_higher(*role))
            .collect();

        for role in effective {
            let allowed = self
                .policy
                .enforce(role.as_str(), &request.path, request.method.as_str())
                .await
                .map_err(|err| match err {
                    AppError::ServiceUnavailable(_) => err,
                    other => AppError::ServiceUnavailable(format!("policy engine: {}", other)),
                })?;
            if allowed {
                return Ok(());
            }
        }
        Err(AppError::Forbidden("Insufficient role for this action".into()))
    }

    /// Bounds a persistence call by the configured timeout. Dropping the returned
    /// future (for example when the client goes away) cancels the call.
    async fn bounded<T, F>(&self, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let limit = Duration::from_secs(self.config.store_timeout_secs);
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AppError::ServiceUnavailable("store lookup timed out".into()))?
    }
}

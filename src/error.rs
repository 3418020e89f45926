//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure is classified locally into a kind (the enum variant) and a message
//! before it crosses the handler boundary, so clients always see a stable
//! `{"error": ..., "code": ...}` body and the right HTTP status.
//!
//! Backend and internal failures are logged with their real cause and answered with
//! a generic message; the cause never reaches the client verbatim.
//!
//! `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error` and `bcrypt::BcryptError` allow the `?` operator
//! to be used throughout the auth and store layers.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Bad signature, expired, malformed, or absent-but-required credential (HTTP 401).
    TokenInvalid(String),
    /// A refresh token or personal access token does not match the stored hash (HTTP 401).
    TokenMismatch(String),
    /// The personal access token was explicitly revoked (HTTP 401).
    TokenRevoked(String),
    /// The personal access token's stored expiry has elapsed (HTTP 401).
    TokenExpired(String),
    /// Login rejected because of wrong credentials (HTTP 401).
    Unauthorized(String),
    /// The account is banned (HTTP 403).
    AccountBanned(String),
    /// The account is locked (HTTP 403).
    AccountLocked(String),
    /// The policy engine denied the request (HTTP 403).
    Forbidden(String),
    /// Cookie-sourced unsafe request without the CSRF header (HTTP 400).
    CsrfHeaderMissing(String),
    /// Cookie-sourced unsafe request without the CSRF cookie (HTTP 400).
    CookieMissing(String),
    /// CSRF header does not match the value derived from the access token (HTTP 403).
    CsrfInvalid(String),
    /// Duplicate resource or invalid state transition (HTTP 409).
    Conflict(String),
    /// Personal access token requested with an expiry that is not in the future (HTTP 422).
    ExpiresAtPast(String),
    /// Unknown id or name (HTTP 404).
    NotExist(String),
    /// Malformed request (HTTP 400).
    BadRequest(String),
    /// Input validation failed (HTTP 422).
    ValidationError(String),
    /// Persistence or policy-engine failure (HTTP 503).
    ServiceUnavailable(String),
    /// Unexpected server-side failure such as configuration or hashing errors (HTTP 500).
    Internal(String),
}

impl AppError {
    /// Stable, machine-readable name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TokenInvalid(_) => "token_invalid",
            AppError::TokenMismatch(_) => "token_mismatch",
            AppError::TokenRevoked(_) => "token_revoked",
            AppError::TokenExpired(_) => "token_expired",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::AccountBanned(_) => "account_banned",
            AppError::AccountLocked(_) => "account_locked",
            AppError::Forbidden(_) => "forbidden",
            AppError::CsrfHeaderMissing(_) => "csrf_header_missing",
            AppError::CookieMissing(_) => "cookie_missing",
            AppError::CsrfInvalid(_) => "csrf_invalid",
            AppError::Conflict(_) => "conflict",
            AppError::ExpiresAtPast(_) => "expires_at_past",
            AppError::NotExist(_) => "not_exist",
            AppError::BadRequest(_) => "bad_request",
            AppError::ValidationError(_) => "validation_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Internal(_) => "internal",
        }
    }

    /// The message carried by the error.
    pub fn message(&self) -> &str {
        match self {
            AppError::TokenInvalid(msg)
            | AppError::TokenMismatch(msg)
            | AppError::TokenRevoked(msg)
            | AppError::TokenExpired(msg)
            | AppError::Unauthorized(msg)
            | AppError::AccountBanned(msg)
            | AppError::AccountLocked(msg)
            | AppError::Forbidden(msg)
            | AppError::CsrfHeaderMissing(msg)
            | AppError::CookieMissing(msg)
            | AppError::CsrfInvalid(msg)
            | AppError::Conflict(msg)
            | AppError::ExpiresAtPast(msg)
            | AppError::NotExist(msg)
            | AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::Internal(msg) => msg,
        }
    }

    /// Message that is safe to show to a client.
    fn public_message(&self) -> &str {
        match self {
            AppError::ServiceUnavailable(_) => "Service temporarily unavailable",
            AppError::Internal(_) => "Internal server error",
            other => other.message(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenInvalid(_)
            | AppError::TokenMismatch(_)
            | AppError::TokenRevoked(_)
            | AppError::TokenExpired(_)
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountBanned(_)
            | AppError::AccountLocked(_)
            | AppError::Forbidden(_)
            | AppError::CsrfInvalid(_) => StatusCode::FORBIDDEN,
            AppError::CsrfHeaderMissing(_) | AppError::CookieMissing(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExpiresAtPast(_) | AppError::ValidationError(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotExist(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, AppError::ServiceUnavailable(_) | AppError::Internal(_)) {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.public_message(),
            "code": self.code(),
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotExist`; every other database failure is a backend
/// outage from the client's point of view.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotExist("Record not found".into()),
            _ => AppError::ServiceUnavailable(format!("database: {}", error)),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// Any failure to decode or verify a JWT is reported the same way: the token is
/// not usable now.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::TokenInvalid(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Internal(format!("bcrypt: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses() {
        let cases = vec![
            (AppError::TokenInvalid("x".into()), 401),
            (AppError::TokenMismatch("x".into()), 401),
            (AppError::TokenRevoked("x".into()), 401),
            (AppError::TokenExpired("x".into()), 401),
            (AppError::AccountBanned("x".into()), 403),
            (AppError::AccountLocked("x".into()), 403),
            (AppError::CsrfHeaderMissing("x".into()), 400),
            (AppError::CookieMissing("x".into()), 400),
            (AppError::CsrfInvalid("x".into()), 403),
            (AppError::Conflict("x".into()), 409),
            (AppError::ExpiresAtPast("x".into()), 422),
            (AppError::NotExist("x".into()), 404),
            (AppError::ServiceUnavailable("x".into()), 503),
            (AppError::Internal("x".into()), 500),
        ];

        for (error, status) in cases {
            let response = error.error_response();
            assert_eq!(response.status().as_u16(), status, "{}", error);
        }
    }

    #[actix_rt::test]
    async fn test_backend_cause_is_not_exposed() {
        let error = AppError::ServiceUnavailable("connection refused on 10.0.0.3:5432".into());
        let response = error.error_response();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], "service_unavailable");
        assert!(!json["error"].as_str().unwrap().contains("10.0.0.3"));
    }

    #[test]
    fn test_sqlx_conversions() {
        assert!(matches!(
            AppError::from(sqlx::Error::RowNotFound),
            AppError::NotExist(_)
        ));
        assert!(matches!(
            AppError::from(sqlx::Error::PoolTimedOut),
            AppError::ServiceUnavailable(_)
        ));
    }
}

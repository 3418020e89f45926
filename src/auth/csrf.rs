use actix_web::http::Method;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::auth::gate::CredentialSource;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Double-submit CSRF defense for cookie-delivered sessions.
///
/// The CSRF value is `HMAC-SHA256(access_token)` keyed with a server secret. It is
/// handed to the client in a script-readable cookie and must be echoed in a header
/// on every unsafe request that authenticates with the access-token cookie.
#[derive(Clone)]
pub struct CsrfGuard {
    secret: Vec<u8>,
    header_name: String,
}

impl CsrfGuard {
    pub fn new(secret: &str, header_name: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            header_name: header_name.to_string(),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Only cookie-sourced requests with a method outside the safe set are guarded.
    pub fn applies(source: CredentialSource, method: &Method) -> bool {
        source == CredentialSource::Cookie
            && !matches!(
                *method,
                Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
            )
    }

    /// Hex-encoded CSRF value for an access token.
    pub fn token_for(&self, access_token: &str) -> Result<String, AppError> {
        let mut mac = self.mac()?;
        mac.update(access_token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks a guarded request. `access_token` is the value of the access-token cookie.
    pub fn verify(
        &self,
        access_token: &str,
        csrf_cookie: Option<&str>,
        csrf_header: Option<&str>,
    ) -> Result<(), AppError> {
        if csrf_cookie.map_or(true, str::is_empty) {
            return Err(AppError::CookieMissing("CSRF cookie is missing".into()));
        }
        let header = csrf_header
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::CsrfHeaderMissing(format!("{} header is missing", self.header_name))
            })?;

        let presented = hex::decode(header)
            .map_err(|_| AppError::CsrfInvalid("CSRF token is invalid".into()))?;

        let mut mac = self.mac()?;
        mac.update(access_token.as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| AppError::CsrfInvalid("CSRF token is invalid".into()))
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid CSRF secret: {}", e)))
    }
}

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpResponseBuilder;

use crate::auth::csrf::CsrfGuard;
use crate::auth::session::SessionTokens;
use crate::error::AppError;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";

const ACCESS_PATH: &str = "/";
const REFRESH_PATH: &str = "/auth";
const CSRF_PATH: &str = "/";

/// Sets and clears the access, refresh and CSRF cookies.
///
/// All three are `SameSite=Strict` and `Secure` outside local environments. The
/// refresh cookie is only sent to `/auth`. The CSRF cookie stays readable by
/// client script so it can be echoed back in a header.
#[derive(Clone)]
pub struct SessionCookieManager {
    secure: bool,
    csrf: CsrfGuard,
}

impl SessionCookieManager {
    pub fn new(secure: bool, csrf: CsrfGuard) -> Self {
        Self { secure, csrf }
    }

    /// The three cookies for a freshly issued pair. Cookie values are exactly the
    /// token strings.
    pub fn session_cookies(&self, tokens: &SessionTokens) -> Result<Vec<Cookie<'static>>, AppError> {
        let csrf = self.csrf.token_for(&tokens.access.token)?;
        Ok(vec![
            self.build(
                ACCESS_COOKIE,
                tokens.access.token.clone(),
                ACCESS_PATH,
                true,
                lifetime(tokens.access.claims.exp),
            ),
            self.build(
                REFRESH_COOKIE,
                tokens.refresh.token.clone(),
                REFRESH_PATH,
                true,
                lifetime(tokens.refresh.claims.exp),
            ),
            self.build(
                CSRF_COOKIE,
                csrf,
                CSRF_PATH,
                false,
                lifetime(tokens.access.claims.exp),
            ),
        ])
    }

    /// Expired, empty versions of the three cookies.
    pub fn cleared_cookies(&self) -> Vec<Cookie<'static>> {
        vec![
            self.build(ACCESS_COOKIE, String::new(), ACCESS_PATH, true, CookieDuration::ZERO),
            self.build(REFRESH_COOKIE, String::new(), REFRESH_PATH, true, CookieDuration::ZERO),
            self.build(CSRF_COOKIE, String::new(), CSRF_PATH, false, CookieDuration::ZERO),
        ]
    }

    pub fn set_session(
        &self,
        response: &mut HttpResponseBuilder,
        tokens: &SessionTokens,
    ) -> Result<(), AppError> {
        for cookie in self.session_cookies(tokens)? {
            response.cookie(cookie);
        }
        Ok(())
    }

    pub fn clear_session(&self, response: &mut HttpResponseBuilder) {
        for cookie in self.cleared_cookies() {
            response.cookie(cookie);
        }
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        path: &'static str,
        http_only: bool,
        max_age: CookieDuration,
    ) -> Cookie<'static> {
        Cookie::build(name, value)
            .path(path)
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(max_age)
            .finish()
    }
}

/// Seconds from now until `exp`, never negative.
fn lifetime(exp: i64) -> CookieDuration {
    let remaining = exp - chrono::Utc::now().timestamp();
    CookieDuration::seconds(remaining.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::test_codec;
    use actix_web::HttpResponse;

    fn tokens() -> SessionTokens {
        let codec = test_codec();
        SessionTokens {
            access: codec.generate_access(1, &[]).unwrap(),
            refresh: codec.generate_refresh(1).unwrap(),
        }
    }

    fn manager(secure: bool) -> SessionCookieManager {
        SessionCookieManager::new(secure, CsrfGuard::new("csrf-secret", "X-CSRF-Token"))
    }

    #[test]
    fn test_session_cookie_attributes() {
        let tokens = tokens();
        let cookies = manager(true).session_cookies(&tokens).unwrap();

        let access = cookies.iter().find(|c| c.name() == ACCESS_COOKIE).unwrap();
        assert_eq!(access.value(), tokens.access.token);
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Strict));

        let refresh = cookies.iter().find(|c| c.name() == REFRESH_COOKIE).unwrap();
        assert_eq!(refresh.value(), tokens.refresh.token);
        assert_eq!(refresh.path(), Some("/auth"));
        assert_eq!(refresh.http_only(), Some(true));

        let csrf = cookies.iter().find(|c| c.name() == CSRF_COOKIE).unwrap();
        let expected = CsrfGuard::new("csrf-secret", "X-CSRF-Token")
            .token_for(&tokens.access.token)
            .unwrap();
        assert_eq!(csrf.value(), expected);
        assert_eq!(csrf.http_only(), Some(false));
        assert_eq!(csrf.path(), Some("/"));
    }

    #[test]
    fn test_local_cookies_are_not_secure() {
        let cookies = manager(false).session_cookies(&tokens()).unwrap();
        assert!(cookies.iter().all(|c| c.secure() == Some(false)));
    }

    #[test]
    fn test_clear_session() {
        let mut builder = HttpResponse::Ok();
        manager(true).clear_session(&mut builder);
        let response = builder.finish();

        let cleared: Vec<_> = response.cookies().collect();
        assert_eq!(cleared.len(), 3);
        for cookie in cleared {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        }
    }
}

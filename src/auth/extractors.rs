use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use std::ops::Deref;

use crate::auth::gate::RequestContext;
use crate::auth::Role;
use crate::error::AppError;

/// The typed request context placed in the request extensions by `AuthMiddleware`.
///
/// Handlers on gated routes take this instead of reading extensions themselves.
/// If the middleware did not run for the route, extraction fails with
/// `TokenInvalid`.
#[derive(Debug, Clone)]
pub struct Authenticated(pub RequestContext);

impl Authenticated {
    pub fn user_id(&self) -> i32 {
        self.0.user.id
    }

    /// The caller owns the resource, or holds `role` or higher.
    pub fn owns_or_has(&self, owner_id: i32, role: Role) -> bool {
        self.0.user.id == owner_id || self.0.user.role.has_role_or_higher(role)
    }
}

impl Deref for Authenticated {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Authenticated {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<RequestContext>().cloned() {
            Some(context) => ready(Ok(Authenticated(context))),
            None => {
                let err = AppError::TokenInvalid(
                    "Request context not found. Ensure AuthMiddleware is active.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

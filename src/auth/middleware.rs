use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::cookies::{ACCESS_COOKIE, CSRF_COOKIE};
use crate::auth::gate::{GateOutcome, GateRequest};
use crate::error::AppError;
use crate::state::AppState;

/// Runs the authorization gate in front of every wrapped route.
///
/// Allowed requests carry a `RequestContext` in their extensions; denied ones
/// are answered with the gate's error.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| AppError::Internal("AppState is not registered".into()))?;

            let gate_request = gate_request(&req, &state.config.csrf_header);
            match state.gate.authorize(&gate_request).await? {
                GateOutcome::Exempt => {}
                GateOutcome::Allowed(context) => {
                    req.extensions_mut().insert(*context);
                }
            }

            service.call(req).await
        })
    }
}

fn gate_request(req: &ServiceRequest, csrf_header: &str) -> GateRequest {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let cookie = |name: &str| req.cookie(name).map(|c| c.value().to_string());

    GateRequest {
        method: req.method().clone(),
        // Percent-decoded the same way the router decodes it before matching.
        path: req.match_info().as_str().to_string(),
        bearer: header("Authorization")
            .and_then(|value| value.strip_prefix("Bearer ").map(str::to_string)),
        access_cookie: cookie(ACCESS_COOKIE),
        csrf_cookie: cookie(CSRF_COOKIE),
        csrf_header: header(csrf_header),
    }
}

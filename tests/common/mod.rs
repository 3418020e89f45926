#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::{self, MessageBody};
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use taskforge_auth::auth::{AuthResponse, KeyProvider, Role, RolePolicy};
use taskforge_auth::config::{AuthConfig, DEFAULT_EXEMPT_PATHS};
use taskforge_auth::models::{NewUser, User};
use taskforge_auth::store::MemoryStore;
use taskforge_auth::AppState;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub fn auth_config() -> AuthConfig {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    AuthConfig {
        issuer: "taskforge-test".into(),
        access_ttl_minutes: 15,
        refresh_ttl_days: 14,
        private_key_path: fixtures.join("ed25519_private.pem"),
        public_key_path: fixtures.join("ed25519_public.pem"),
        csrf_secret: "integration-csrf-secret".into(),
        csrf_header: CSRF_HEADER.into(),
        environment: "test".into(),
        bcrypt_cost: 4,
        store_timeout_secs: 10,
        exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
    }
}

/// Application state over a fresh in-memory store.
pub fn test_state() -> web::Data<AppState> {
    let config = auth_config();
    let keys = Arc::new(
        KeyProvider::from_files(&config.private_key_path, &config.public_key_path)
            .expect("fixture keys load"),
    );
    let store = Arc::new(MemoryStore::new());
    web::Data::new(AppState::new(
        config,
        keys,
        store.clone(),
        store,
        Arc::new(RolePolicy::standard()),
    ))
}

/// Builds the full app (routes behind `AuthMiddleware`) over `$state`.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .wrap(taskforge_auth::auth::AuthMiddleware)
                .wrap(actix_web::middleware::Logger::default())
                .configure(taskforge_auth::routes::config),
        )
        .await
    };
}

/// Inserts an account directly into the store.
pub async fn seed_user(state: &AppState, email: &str, password: &str, role: Role) -> User {
    let user = state
        .users
        .create(NewUser {
            username: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password_hash: state.hasher.hash_password(password).unwrap(),
            role: Role::User,
        })
        .await
        .expect("seed user");
    if role == Role::User {
        return user;
    }
    state.users.update_role(user.id, role).await.expect("seed role")
}

/// Tokens and cookies from a successful login.
pub struct Session {
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: String,
    pub cookies: HashMap<String, String>,
}

impl Session {
    pub fn cookie(&self, name: &str) -> Cookie<'static> {
        Cookie::new(name.to_string(), self.cookies[name].clone())
    }

    pub fn bearer(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.access_token))
    }
}

/// Status, cookies and JSON body of one call through the app.
///
/// Requests rejected by `AuthMiddleware` surface as service errors; they are
/// rendered the same way the server would render them.
pub struct Reply {
    pub status: StatusCode,
    pub cookies: HashMap<String, String>,
    pub body: Value,
}

impl Reply {
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

pub async fn send<S, B>(app: &S, req: Request) -> Reply
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(resp) => {
            let status = resp.status();
            let cookies = resp
                .response()
                .cookies()
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect();
            let bytes = test::read_body(resp).await;
            Reply {
                status,
                cookies,
                body: serde_json::from_slice(&bytes).unwrap_or_default(),
            }
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let bytes = body::to_bytes(resp.into_body()).await.unwrap_or_default();
            Reply {
                status,
                cookies: HashMap::new(),
                body: serde_json::from_slice(&bytes).unwrap_or_default(),
            }
        }
    }
}

pub async fn login<S, B>(app: &S, email: &str, password: &str) -> Session
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    let reply = send(app, req).await;
    assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);

    let body: AuthResponse = serde_json::from_value(reply.body).expect("auth response");
    Session {
        user_id: body.user_id,
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        cookies: reply.cookies,
    }
}

pub async fn find_user(state: &AppState, id: i32) -> User {
    state
        .users
        .find_by_id(id)
        .await
        .unwrap()
        .expect("user exists")
}

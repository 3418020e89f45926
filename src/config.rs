use crate::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Routes that never enter the authorization pipeline.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/health",
    "/auth/login",
    "/auth/register",
    "/auth/refresh",
    "/docs",
];

pub struct Config {
    /// `None` runs the server on the in-memory store.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub auth: AuthConfig,
}

/// Settings for token issuance, cookies, CSRF and the request pipeline.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub csrf_secret: String,
    pub csrf_header: String,
    pub environment: String,
    pub bcrypt_cost: u32,
    pub store_timeout_secs: u64,
    pub exempt_paths: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            server_port: parse_var("SERVER_PORT", 8080)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            auth: AuthConfig::from_env()?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let private_key_path = PathBuf::from(required_var("JWT_PRIVATE_KEY_PATH")?);
        let public_key_path = match env::var("JWT_PUBLIC_KEY_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let mut path = private_key_path.clone().into_os_string();
                path.push(".pub");
                PathBuf::from(path)
            }
        };

        Ok(Self {
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "taskforge".to_string()),
            access_ttl_minutes: parse_var("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_ttl_days: parse_var("REFRESH_TOKEN_TTL_DAYS", 14)?,
            private_key_path,
            public_key_path,
            csrf_secret: required_var("CSRF_SECRET")?,
            csrf_header: env::var("CSRF_HEADER_NAME").unwrap_or_else(|_| "X-CSRF-Token".to_string()),
            environment: env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()),
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            store_timeout_secs: parse_var("STORE_TIMEOUT_SECS", 10)?,
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Local environments serve cookies without the `Secure` attribute.
    pub fn is_local(&self) -> bool {
        matches!(
            self.environment.as_str(),
            "local" | "development" | "dev" | "test"
        )
    }

    /// Whether `path` bypasses the authorization pipeline.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|exempt| {
            path == exempt
                || path
                    .strip_prefix(exempt.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

fn required_var(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Internal(format!("{} must be set", name)))
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Internal(format!("{} must be a number", name))),
        Err(_) => Ok(default),
    }
}

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::io;
use std::sync::Arc;

use taskforge_auth::auth::{AuthMiddleware, KeyProvider, RolePolicy};
use taskforge_auth::config::Config;
use taskforge_auth::store::{MemoryStore, PgStore, TokenStore, UserStore};
use taskforge_auth::{routes, AppError, AppState};

fn startup_error(err: AppError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(startup_error)?;
    let keys = Arc::new(
        KeyProvider::from_files(&config.auth.private_key_path, &config.auth.public_key_path)
            .map_err(startup_error)?,
    );

    let (users, tokens): (Arc<dyn UserStore>, Arc<dyn TokenStore>) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPool::connect(database_url)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let store = Arc::new(PgStore::new(pool));
            let users: Arc<dyn UserStore> = store.clone();
            let tokens: Arc<dyn TokenStore> = store;
            (users, tokens)
        }
        None => {
            log::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn UserStore> = store.clone();
            let tokens: Arc<dyn TokenStore> = store;
            (users, tokens)
        }
    };

    let state = web::Data::new(AppState::new(
        config.auth.clone(),
        keys,
        users,
        tokens,
        Arc::new(RolePolicy::standard()),
    ));

    log::info!("Starting TaskForge auth server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(AuthMiddleware)
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(routes::config)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}

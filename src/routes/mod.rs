pub mod auth;
pub mod health;
pub mod tokens;
pub mod users;

use actix_web::web;

/// Registers every route. Wrap the app in `AuthMiddleware`; exempt paths are
/// decided by `AuthConfig`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(
            web::scope("/auth")
                .service(auth::login)
                .service(auth::register)
                .service(auth::refresh)
                .service(auth::logout),
        )
        .service(
            web::scope("/api")
                .service(
                    web::scope("/users")
                        .service(users::me)
                        .service(users::update_status)
                        .service(users::update_role),
                )
                .service(
                    web::scope("/tokens")
                        .service(tokens::create_token)
                        .service(tokens::list_tokens)
                        .service(tokens::get_token)
                        .service(tokens::revoke_token),
                ),
        );
}

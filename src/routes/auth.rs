use crate::{
    auth::{
        cookies::REFRESH_COOKIE, AuthResponse, Authenticated, LoginRequest, RefreshRequest,
        RegisterRequest, Role,
    },
    error::AppError,
    models::NewUser,
    state::AppState,
};
use actix_web::{post, web, HttpRequest, HttpResponse};
use validator::Validate;

/// Register a new user
///
/// Creates a `user`-role account and starts a session for it.
///
/// ## Responses:
/// - `201 Created`: `AuthResponse` plus session cookies.
/// - `409 Conflict`: the email is already registered.
/// - `422 Unprocessable Entity`: input validation failed.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    register_data.validate()?;

    let password_hash = state.hasher.hash_password(&register_data.password)?;
    let register_data = register_data.into_inner();
    let user = state
        .users
        .create(NewUser {
            username: register_data.username,
            email: register_data.email,
            password_hash,
            role: Role::User,
        })
        .await?;
    log::info!("Registered user {}", user.id);

    let tokens = state.sessions.login(&user).await?;
    let mut response = HttpResponse::Created();
    state.cookies.set_session(&mut response, &tokens)?;
    Ok(response.json(AuthResponse::new(user.id, &tokens)))
}

/// Login user
///
/// Checks credentials and account status, then issues an access/refresh pair.
/// The pair is returned in the body and also set as cookies, together with the
/// CSRF cookie.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    login_data.validate()?;

    let user = state
        .sessions
        .authenticate(&login_data.email, &login_data.password)
        .await?;
    let tokens = state.sessions.login(&user).await?;

    let mut response = HttpResponse::Ok();
    state.cookies.set_session(&mut response, &tokens)?;
    Ok(response.json(AuthResponse::new(user.id, &tokens)))
}

/// Exchange a refresh token for a new pair
///
/// The refresh token is read from the JSON body, falling back to the
/// `refresh_token` cookie. The presented token stops working once exchanged.
#[post("/refresh")]
pub async fn refresh(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse, AppError> {
    let presented = body
        .and_then(|body| body.into_inner().refresh_token)
        .or_else(|| req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::TokenInvalid("Missing refresh token".into()))?;

    let (user, tokens) = state.sessions.exchange(&presented).await?;

    let mut response = HttpResponse::Ok();
    state.cookies.set_session(&mut response, &tokens)?;
    Ok(response.json(AuthResponse::new(user.id, &tokens)))
}

/// Logout
///
/// Invalidates the stored refresh hash and clears the session cookies.
#[post("/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<HttpResponse, AppError> {
    state.sessions.logout(&auth.user).await?;

    let mut response = HttpResponse::NoContent();
    state.cookies.clear_session(&mut response);
    Ok(response.finish())
}

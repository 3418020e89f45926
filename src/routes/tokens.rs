use crate::{
    auth::{Authenticated, Role},
    error::AppError,
    models::{CreateTokenRequest, PersonalAccessToken, TokenView},
    state::AppState,
};
use actix_web::{delete, get, post, web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

/// Creates a personal access token for the caller.
///
/// ## Request Body:
/// - `name`: unique among the caller's active tokens.
/// - `expires_at`: `YYYY-MM-DD`, strictly in the future.
///
/// ## Responses:
/// - `201 Created`: metadata plus the plaintext `token`. This is the only time
///   the plaintext is returned.
/// - `409 Conflict`: a token with this name already exists.
/// - `422 Unprocessable Entity`: invalid input or `expires_at` not in the future.
#[post("")]
pub async fn create_token(
    state: web::Data<AppState>,
    auth: Authenticated,
    body: web::Json<CreateTokenRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let created = state
        .tokens
        .create(&auth.token, &body.name, &body.expires_at)
        .await?;
    Ok(HttpResponse::Created().json(created))
}

/// Lists the caller's tokens, newest first. Never includes plaintext.
#[get("")]
pub async fn list_tokens(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<HttpResponse, AppError> {
    let tokens: Vec<TokenView> = state
        .tokens
        .find(auth.user_id())
        .await?
        .iter()
        .map(TokenView::from)
        .collect();
    Ok(HttpResponse::Ok().json(tokens))
}

#[get("/{id}")]
pub async fn get_token(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let pat = visible_token(&state, &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TokenView::from(&pat)))
}

/// Revokes a token. Revoking twice is a `409 Conflict`.
#[delete("/{id}")]
pub async fn revoke_token(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let pat = visible_token(&state, &auth, path.into_inner()).await?;
    state.tokens.revoke(&pat).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Tokens are visible to their owner and to `admin` and above; to anyone else
/// they do not exist.
async fn visible_token(
    state: &AppState,
    auth: &Authenticated,
    id: Uuid,
) -> Result<PersonalAccessToken, AppError> {
    let pat = state.tokens.read(id).await?;
    if !auth.owns_or_has(pat.user_id, Role::Admin) {
        return Err(AppError::NotExist(format!("Token {} does not exist", id)));
    }
    Ok(pat)
}

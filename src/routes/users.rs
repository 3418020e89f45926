use crate::{
    auth::{Authenticated, Role},
    error::AppError,
    models::{RoleUpdate, StatusUpdate, User},
    state::AppState,
};
use actix_web::{get, put, web, HttpResponse};

/// The authenticated account.
#[get("/me")]
pub async fn me(auth: Authenticated) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(&auth.user))
}

/// Ban/unban or lock/unlock an account. Gated to `admin` and above by the policy.
///
/// Only accounts ranked below the caller can be changed; `super` may change
/// any account.
#[put("/{id}/status")]
pub async fn update_status(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i32>,
    update: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    require_role(&auth, Role::Admin)?;
    let target = load_user(&state, id).await?;
    if auth.user.role != Role::Super && auth.user.role.rank() <= target.role.rank() {
        return Err(AppError::Forbidden(
            "Cannot change the status of an account with an equal or higher role".into(),
        ));
    }

    let user = state
        .users
        .update_status(id, update.banned, update.locked)
        .await?;
    log::info!(
        "[{}] user {} set status of user {} to banned={} locked={}",
        auth.request_id,
        auth.user_id(),
        id,
        user.banned,
        user.locked
    );
    Ok(HttpResponse::Ok().json(user))
}

/// Change an account's role. Gated to `super` by the policy.
#[put("/{id}/role")]
pub async fn update_role(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i32>,
    update: web::Json<RoleUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    require_role(&auth, Role::Super)?;
    let user = state.users.update_role(id, update.role).await?;
    log::info!(
        "[{}] user {} set role of user {} to {}",
        auth.request_id,
        auth.user_id(),
        id,
        user.role
    );
    Ok(HttpResponse::Ok().json(user))
}

/// Handler-level check on top of the policy decision.
fn require_role(auth: &Authenticated, role: Role) -> Result<(), AppError> {
    if !auth.user.role.has_role_or_higher(role) {
        return Err(AppError::Forbidden("Insufficient role for this action".into()));
    }
    Ok(())
}

async fn load_user(state: &AppState, id: i32) -> Result<User, AppError> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotExist(format!("User {} does not exist", id)))
}

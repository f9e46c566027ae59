use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::extractors::CurrentIdentity;
use crate::error::AppError;
use crate::identity::permission::{admin_only, manager_or_admin, Permission};
use crate::identity::Identity;
use crate::state::AppState;
use crate::users::dto::{Pagination, RoleSummary, RotatedLogin, UserSummary};
use crate::users::repo_types::{Role, User};

// Management routes address users by the opaque alternative id; the numeric
// primary key never appears in a path or a response body.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:alternative_id/activate", post(activate_user))
        .route("/users/:alternative_id/deactivate", post(deactivate_user))
        .route("/users/:alternative_id/rotate-login", post(rotate_login))
        .route("/roles", get(list_roles))
}

fn require(permission: Permission, identity: &Identity) -> Result<(), AppError> {
    if permission.allows(identity) {
        Ok(())
    } else {
        warn!("permission denied");
        Err(AppError::AccessDenied)
    }
}

#[instrument(skip(state, identity))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    require(manager_or_admin(), &identity)?;
    let limit = page.limit.clamp(1, 100);
    let offset = page.offset.max(0);
    let users = User::list(&state.db, limit, offset).await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

#[instrument(skip(state, identity, alternative_id))]
pub async fn activate_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(alternative_id): Path<String>,
) -> Result<Json<UserSummary>, AppError> {
    require(manager_or_admin(), &identity)?;
    if !User::set_activated(&state.db, &alternative_id, true).await? {
        return Err(AppError::NotFound);
    }
    let user = User::find_by_alternative_id(&state.db, &alternative_id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(email = %user.email, "user activated");
    Ok(Json(UserSummary::from(&user)))
}

#[instrument(skip(state, identity, alternative_id))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(alternative_id): Path<String>,
) -> Result<Json<UserSummary>, AppError> {
    require(manager_or_admin(), &identity)?;
    if !User::set_activated(&state.db, &alternative_id, false).await? {
        return Err(AppError::NotFound);
    }
    let user = User::find_by_alternative_id(&state.db, &alternative_id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(email = %user.email, "user deactivated");
    Ok(Json(UserSummary::from(&user)))
}

#[instrument(skip(state, identity))]
pub async fn list_roles(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<RoleSummary>>, AppError> {
    require(manager_or_admin(), &identity)?;
    let roles = Role::all(&state.db).await?;
    Ok(Json(roles.iter().map(RoleSummary::from).collect()))
}

/// Admin-only: swap the user's login identifier, invalidating every session
/// and refresh token issued against the old one. The old identifier in the
/// path is dead the moment this returns.
#[instrument(skip(state, identity, alternative_id))]
pub async fn rotate_login(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(alternative_id): Path<String>,
) -> Result<Json<RotatedLogin>, AppError> {
    require(admin_only(), &identity)?;
    let alternative_id = User::rotate_alternative_id(&state.db, &alternative_id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!("login identifier rotated");
    Ok(Json(RotatedLogin { alternative_id }))
}

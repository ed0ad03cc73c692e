use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::require_staff;
use crate::access::Actor;
use crate::api::extract::FormOrJson;
use crate::core::users;
use crate::error::AppError;
use crate::forms::PermissionForm;
use crate::AppState;

/// Refused with 409 while the user owns products or orders.
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_staff(&actor, &format!("/admin/auth/user/{id}/delete/"))?;
    users::delete_user(state.db.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Permission changes are for superusers only.
fn require_superuser(actor: &Actor, path: &str) -> Result<(), AppError> {
    actor.require(actor.is_superuser(), path)
}

pub async fn permissions(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    require_staff(&actor, &format!("/admin/auth/user/{id}/permissions/"))?;
    let granted = users::permissions_of(state.db.as_ref(), id).await?;
    Ok(Json(json!({ "user": id, "permissions": granted })))
}

pub async fn grant_permission(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<PermissionForm>,
) -> Result<Json<Value>, AppError> {
    require_superuser(&actor, &format!("/admin/auth/user/{id}/permissions/grant/"))?;
    let perm = form.clean()?;
    let db = state.db.as_ref();
    users::get(db, id).await?;
    users::grant(db, id, perm).await?;
    info!(user_id = id, codename = perm.codename(), "Permission granted");
    let granted = users::permissions_of(db, id).await?;
    Ok(Json(json!({ "user": id, "permissions": granted })))
}

pub async fn revoke_permission(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<PermissionForm>,
) -> Result<Json<Value>, AppError> {
    require_superuser(&actor, &format!("/admin/auth/user/{id}/permissions/revoke/"))?;
    let perm = form.clean()?;
    let db = state.db.as_ref();
    users::get(db, id).await?;
    users::revoke(db, id, perm).await?;
    info!(user_id = id, codename = perm.codename(), "Permission revoked");
    let granted = users::permissions_of(db, id).await?;
    Ok(Json(json!({ "user": id, "permissions": granted })))
}

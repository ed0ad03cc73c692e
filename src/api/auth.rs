use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::access::{can_edit_profile, Actor};
use crate::api::extract::FormOrJson;
use crate::api::found;
use crate::core::users;
use crate::entities::profile;
use crate::error::AppError;
use crate::forms::{LoginForm, ProfileForm, RegisterForm};
use crate::middleware::auth::{generate_token, AUTH_COOKIE};
use crate::serializers::UserBrief;
use crate::AppState;

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route("/register/", post(register))
        .route("/users/", get(list_users))
        .route("/profile/:id", get(profile_detail).post(update_profile))
        .route("/about-me/", get(about_me))
}

fn auth_cookie(token: String) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    FormOrJson(payload): FormOrJson<LoginForm>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let user =
        users::authenticate(state.db.as_ref(), &payload.username, &payload.password).await?;
    let token = generate_token(&state.config.secret, user.id)?;
    info!(user_id = user.id, "User logged in");

    Ok((
        jar.add(auth_cookie(token.clone())),
        Json(json!({ "token": token })),
    ))
}

async fn logout(State(state): State<AppState>, actor: Actor, jar: CookieJar) -> Response {
    if let Some(id) = actor.id() {
        info!(user_id = id, "User logged out");
    }
    let jar = state
        .sessions
        .flush(jar)
        .remove(Cookie::build(AUTH_COOKIE).path("/"));
    (jar, found("/login/")).into_response()
}

/// Creates the account, logs it in and sends it to its new profile.
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    FormOrJson(form): FormOrJson<RegisterForm>,
) -> Result<Response, AppError> {
    let (created, created_profile) = users::register(state.db.as_ref(), form).await?;
    let token = generate_token(&state.config.secret, created.id)?;
    Ok((
        jar.add(auth_cookie(token)),
        found(&format!("/profile/{}", created_profile.id)),
    )
        .into_response())
}

async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    let all: Vec<UserBrief> = users::list(state.db.as_ref())
        .await?
        .iter()
        .map(UserBrief::from)
        .collect();
    Ok(Json(json!({ "users": all, "active_user": actor.id() })))
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    user: UserBrief,
    first_name: String,
    profile: profile::Model,
}

async fn profile_page(state: &AppState, current: profile::Model) -> Result<ProfilePage, AppError> {
    let owner = users::get(state.db.as_ref(), current.user_id).await?;
    Ok(ProfilePage {
        user: UserBrief::from(&owner),
        first_name: owner.first_name,
        profile: current,
    })
}

/// Readable by its owner and by superusers only.
async fn profile_detail(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<ProfilePage>, AppError> {
    let current = users::profile(state.db.as_ref(), id).await?;
    actor.require(can_edit_profile(&actor, &current), &format!("/profile/{id}"))?;
    Ok(Json(profile_page(&state, current).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<ProfileForm>,
) -> Result<Response, AppError> {
    let current = users::profile(state.db.as_ref(), id).await?;
    actor.require(can_edit_profile(&actor, &current), &format!("/profile/{id}"))?;
    users::update_profile(state.db.as_ref(), current, form).await?;
    Ok(found("/about-me/"))
}

async fn about_me(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<ProfilePage>, AppError> {
    let user_id = actor.require_login("/about-me/")?;
    let current = users::profile_of(state.db.as_ref(), user_id).await?;
    Ok(Json(profile_page(&state, current).await?))
}

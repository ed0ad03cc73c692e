use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::access::Actor;
use crate::config::TOKEN_LIFETIME_HOURS;
use crate::entities::{permission, user};
use crate::error::AppError;
use crate::AppState;

/// Cookie that carries the same JWT as the `Authorization` header.
pub const AUTH_COOKIE: &str = "auth_token";

/// Resolves the acting user for every request and stores it as a request
/// extension. A request without credentials proceeds as anonymous; a bearer
/// token that fails validation is rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let actor = match bearer {
        Some(value) => {
            let Some(token) = value.strip_prefix("Bearer ") else {
                return AppError::from(AuthError::ValidationFail).into_response();
            };
            match resolve_actor(&state.db, &state.config.secret, token).await {
                Ok(actor) => actor,
                Err(err) => return AppError::from(err).into_response(),
            }
        }
        None => {
            let jar = CookieJar::from_headers(req.headers());
            match jar.get(AUTH_COOKIE) {
                Some(cookie) => resolve_actor(&state.db, &state.config.secret, cookie.value())
                    .await
                    .unwrap_or_else(|err| {
                        debug!(error = %err, "Ignoring stale auth cookie");
                        Actor::anonymous()
                    }),
                None => Actor::anonymous(),
            }
        }
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub exp: usize,
}

pub fn generate_token(secret: &str, user_id: i32) -> Result<String, AuthError> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_LIFETIME_HOURS))
        .ok_or(AuthError::TokenGeneration)?
        .timestamp() as usize;

    let claims = Claims { user_id, exp };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::TokenGeneration)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::TokenExpired)
}

/// Loads the user named by the token together with its permission grants.
pub async fn resolve_actor(
    db: &DatabaseConnection,
    secret: &str,
    token: &str,
) -> Result<Actor, AuthError> {
    let claims = validate_token(secret, token)?;

    let found = user::Entity::find_by_id(claims.user_id)
        .one(db)
        .await
        .map_err(|_| AuthError::InternalServerError)?
        .ok_or(AuthError::InvalidUser)?;

    let grants = found
        .find_related(permission::Entity)
        .all(db)
        .await
        .map_err(|_| AuthError::InternalServerError)?;

    Ok(Actor::user(
        &found,
        grants.into_iter().map(|grant| grant.codename),
    ))
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication credentials were not provided")]
    MissingCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid user id")]
    InvalidUser,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    TokenGeneration,
    #[error("Failed to hash password")]
    PasswordHash,
    #[error("Internal server error")]
    InternalServerError,
}

//! The HTTP-facing error type and its response mapping.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

use crate::api::found;
use crate::csv_exchange::CsvError;
use crate::middleware::auth::AuthError;
use crate::middleware::logging::ErrorTrace;

/// Field name -> messages, reported back on invalid form input.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid input in {} field(s)", .0.len())]
    Validation(FieldErrors),
    /// Anonymous actor on a page that needs a login; carries the page path.
    #[error("login required for {0}")]
    LoginRequired(String),
    #[error("unauthorized: {0}")]
    Unauthorized(AuthError),
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error("database: {0}")]
    Db(#[from] DbErr),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn field(name: &str, message: impl Into<String>) -> AppError {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_owned(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn not_found(what: &str, id: i32) -> AppError {
        AppError::NotFound(format!("No {what} with {id} id was found."))
    }
}

impl From<AuthError> for AppError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::PasswordHash | AuthError::TokenGeneration => {
                AppError::Internal(value.to_string())
            }
            other => AppError::Unauthorized(other),
        }
    }
}

/// `/login/?next=<path>` with the path query-encoded; slashes stay readable.
fn login_redirect(next: &str) -> String {
    let encoded: Vec<String> = next
        .split('/')
        .map(|segment| form_urlencoded::byte_serialize(segment.as_bytes()).collect())
        .collect();
    format!("/login/?next={}", encoded.join("/"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace = ErrorTrace(self.to_string());
        let mut response = match self {
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            AppError::LoginRequired(next) => found(&login_redirect(&next)),
            AppError::Unauthorized(err) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": err.to_string() })))
                    .into_response()
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "You do not have permission to perform this action." })),
            )
                .into_response(),
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            AppError::Csv(err) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
                    .into_response()
            }
            AppError::Db(_) | AppError::Io(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        };
        response.extensions_mut().insert(trace);
        response
    }
}

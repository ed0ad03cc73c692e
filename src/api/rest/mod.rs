//! JSON viewsets under `/api/`.

pub mod orders;
pub mod products;

use std::str::FromStr;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::access::Actor;
use crate::core::Window;
use crate::error::AppError;
use crate::middleware::auth::AuthError;
use crate::AppState;

pub fn rest_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products/",
            get(products::list).post(products::create),
        )
        .route("/api/products/download_csv/", get(products::download_csv))
        .route("/api/products/upload_csv/", post(products::upload_csv))
        .route(
            "/api/products/:id/",
            get(products::retrieve)
                .put(products::update)
                .patch(products::partial_update)
                .delete(products::destroy),
        )
        .route("/api/orders/", get(orders::list).post(orders::create))
        .route("/api/orders/download_csv/", get(orders::download_csv))
        .route("/api/orders/upload_csv/", post(orders::upload_csv))
        .route(
            "/api/orders/:id/",
            get(orders::retrieve)
                .put(orders::update)
                .patch(orders::partial_update)
                .delete(orders::destroy),
        )
}

/// Writes through the API need a logged-in actor; answers 401 otherwise.
pub fn require_api_user(actor: &Actor) -> Result<i32, AppError> {
    actor
        .id()
        .ok_or(AppError::Unauthorized(AuthError::MissingCredentials))
}

/// Parses an optional exact-match query value, naming the field on failure.
pub fn parse_param<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::field(field, "Enter a valid value.")),
    }
}

pub fn parse_flag(field: &str, raw: Option<&str>) -> Result<Option<bool>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some("true" | "True" | "1") => Ok(Some(true)),
        Some("false" | "False" | "0") => Ok(Some(false)),
        Some(_) => Err(AppError::field(field, "Select a valid choice.")),
    }
}

/// Largest value the database driver accepts for LIMIT and OFFSET.
const WINDOW_MAX: u64 = i64::MAX as u64;

pub fn window(limit: Option<u64>, offset: Option<u64>) -> Window {
    Window {
        limit: limit.map(|limit| limit.min(WINDOW_MAX)),
        offset: offset.unwrap_or(0).min(WINDOW_MAX),
    }
}

/// Link to another page of the same list, keeping every other parameter.
fn page_link(path: &str, query: Option<&str>, limit: u64, offset: u64) -> String {
    let mut params: Vec<String> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            key != "limit" && key != "offset"
        })
        .map(str::to_owned)
        .collect();
    params.push(format!("limit={limit}"));
    if offset > 0 {
        params.push(format!("offset={offset}"));
    }
    format!("{path}?{}", params.join("&"))
}

/// A bare array without `limit`, else a limit/offset page.
pub fn list_body<T: Serialize>(
    path: &str,
    query: Option<&str>,
    window: Window,
    count: u64,
    results: Vec<T>,
) -> Value {
    let Some(limit) = window.limit else {
        return json!(results);
    };
    let offset = window.offset;
    let next_offset = offset.saturating_add(limit);
    let next = (next_offset < count).then(|| page_link(path, query, limit, next_offset));
    let previous = (offset > 0).then(|| page_link(path, query, limit, offset.saturating_sub(limit)));
    json!({
        "count": count,
        "next": next,
        "previous": previous,
        "results": results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaged_list_is_a_bare_array() {
        let body = list_body("/api/products/", None, Window::default(), 2, vec![1, 2]);
        assert_eq!(body, json!([1, 2]));
    }

    #[test]
    fn page_links_keep_filters() {
        let window = Window {
            limit: Some(2),
            offset: 2,
        };
        let body = list_body(
            "/api/products/",
            Some("search=desk&limit=2&offset=2"),
            window,
            5,
            vec![3, 4],
        );
        assert_eq!(body["count"], 5);
        assert_eq!(body["next"], "/api/products/?search=desk&limit=2&offset=4");
        assert_eq!(body["previous"], "/api/products/?search=desk&limit=2");
    }

    #[test]
    fn last_page_has_no_next() {
        let window = Window {
            limit: Some(10),
            offset: 0,
        };
        let body = list_body("/api/orders/", None, window, 3, vec![1, 2, 3]);
        assert!(body["next"].is_null());
        assert!(body["previous"].is_null());
    }

    #[test]
    fn oversized_window_is_clamped() {
        let clamped = window(Some(u64::MAX), Some(u64::MAX));
        assert_eq!(clamped.limit, Some(i64::MAX as u64));
        assert_eq!(clamped.offset, i64::MAX as u64);

        let body = list_body("/api/products/", None, clamped, 3, Vec::<i32>::new());
        assert!(body["next"].is_null());
        assert!(body["previous"].is_string());
    }

    #[test]
    fn flags_parse_strictly() {
        assert_eq!(parse_flag("archived", Some("true")).unwrap(), Some(true));
        assert_eq!(parse_flag("archived", None).unwrap(), None);
        assert!(parse_flag("archived", Some("maybe")).is_err());
        assert!(parse_param::<i32>("discount", Some("x")).is_err());
    }
}

pub mod admin;
pub mod auth;
pub mod blog;
pub mod demo;
pub mod extract;
pub mod rest;
pub mod shop;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::REQUEST_BODY_LIMIT;
use crate::middleware::{
    auth::auth_middleware, counters::count_requests_middleware, logging::logging_middleware,
    throttle::throttle_middleware, user_agent::user_agent_middleware,
};
use crate::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(shop::shop_router())
        .merge(rest::rest_router())
        .merge(admin::admin_router())
        .merge(blog::blog_router())
        .merge(auth::auth_router())
        .merge(demo::demo_router())
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn(user_agent_middleware))
        .layer(from_fn_with_state(state.clone(), throttle_middleware))
        .layer(from_fn(logging_middleware))
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(from_fn_with_state(state.clone(), count_requests_middleware))
        .with_state(state)
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// A CSV body offered as a download.
pub fn csv_attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

pub fn xml_response(content_type: &'static str, body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Scheme and host the client used, for absolute links in feeds.
pub fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

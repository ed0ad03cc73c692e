//! Small request, cookie and session pages.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::access::{Actor, Permission};
use crate::api::extract::MultipartForm;
use crate::config::{COOKIE_MAX_AGE_SECS, UPLOAD_SIZE_LIMIT};
use crate::error::AppError;
use crate::middleware::counters::CounterSnapshot;
use crate::middleware::user_agent::UserAgent;
use crate::storage;
use crate::AppState;

const DEMO_COOKIE: &str = "fizz";
const SESSION_KEY: &str = "foobar";

pub fn demo_router() -> Router<AppState> {
    Router::new()
        .route("/hello/", get(hello))
        .route("/foo-bar/", get(foo_bar))
        .route("/cookie/get", get(get_cookie))
        .route("/cookie/set", get(set_cookie))
        .route("/session/set", get(set_session))
        .route("/session/get", get(get_session))
        .route("/req/get/", get(query_params))
        .route("/req/upload/", post(upload_file))
        .route("/req/counters/", get(counters))
        .route("/media/*path", get(serve_media))
}

#[derive(Debug, Default, Deserialize)]
pub struct HelloQuery {
    items: Option<String>,
}

fn products_line(items: i64) -> String {
    if items == 1 {
        "product".to_owned()
    } else {
        format!("{items} products")
    }
}

async fn hello(Query(query): Query<HelloQuery>) -> Result<Response, AppError> {
    let items = match query.items.as_deref().filter(|raw| !raw.is_empty()) {
        None => 0,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest(format!("'{raw}' is not a number")))?,
    };
    let body = format!(
        "<h1>welcome Hello World!</h1>\n<h2>{}</h2>",
        products_line(items)
    );
    Ok(html(body))
}

fn html(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

async fn foo_bar() -> Json<Value> {
    Json(json!({ "foo": "bar", "spam": "eggs" }))
}

async fn get_cookie(jar: CookieJar) -> String {
    let value = jar
        .get(DEMO_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .unwrap_or_else(|| "default_value".to_owned());
    format!("Cookie value '{value}' + {}", rand::random::<f64>())
}

async fn set_cookie(actor: Actor, jar: CookieJar) -> Result<(CookieJar, &'static str), AppError> {
    actor.require(actor.is_superuser(), "/cookie/set")?;
    let cookie = Cookie::build((DEMO_COOKIE, "buzz"))
        .path("/")
        .max_age(time::Duration::seconds(COOKIE_MAX_AGE_SECS));
    Ok((jar.add(cookie), "Cookie_set"))
}

async fn set_session(
    State(state): State<AppState>,
    actor: Actor,
    jar: CookieJar,
) -> Result<(CookieJar, &'static str), AppError> {
    actor.require_perm(Permission::ViewProfile, "/session/set")?;
    let jar = state.sessions.set(jar, SESSION_KEY, "spameggs");
    Ok((jar, "Session Set!"))
}

async fn get_session(
    State(state): State<AppState>,
    actor: Actor,
    jar: CookieJar,
) -> Result<String, AppError> {
    actor.require_login("/session/get")?;
    let value = state
        .sessions
        .get(&jar, SESSION_KEY)
        .unwrap_or_else(|| "default value".to_owned());
    Ok(format!("Session value: '{value}'"))
}

#[derive(Debug, Default, Deserialize)]
pub struct SumQuery {
    #[serde(default)]
    a: String,
    #[serde(default)]
    b: String,
}

/// Echoes `a` and `b` and their concatenation.
async fn query_params(agent: UserAgent, Query(query): Query<SumQuery>) -> Json<Value> {
    info!(user_agent = agent.0.as_deref().unwrap_or("-"), "Query params page");
    let result = format!("{}{}", query.a, query.b);
    Json(json!({ "a": query.a, "b": query.b, "result": result }))
}

/// Stores the `file` part under `uploads/` unless it is over the size ceiling.
async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = MultipartForm::read(multipart).await?;
    let file = form.require_file("file")?;
    let file_size = file.data.len();

    if file_size > UPLOAD_SIZE_LIMIT {
        warn!(filename = %file.filename, file_size, "Upload over the size ceiling refused");
        return Ok(Json(json!({
            "message": "Unable to upload file more than 10 (Mb)",
            "file_size": file_size,
        })));
    }

    let relative = storage::upload_path(&file.filename);
    storage::save(&state.config.media_root, &relative, &file.data).await?;
    Ok(Json(json!({
        "message": "File saved successfully",
        "file_size": file_size,
        "path": relative,
    })))
}

async fn counters(State(state): State<AppState>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}

async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let target = storage::resolve(&state.config.media_root, &path)?;
    let file = tokio::fs::File::open(&target)
        .await
        .map_err(|_| AppError::NotFound(format!("No media at {path}")))?;

    let content_type = mime_guess::from_path(&target)
        .first_raw()
        .unwrap_or("application/octet-stream");
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, "inline"),
        ],
        body,
    )
        .into_response())
}

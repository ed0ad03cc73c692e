mod common;

use reqwest::multipart::{Form, Part};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use shopsite::access::Permission;
use shopsite::config::UPLOAD_SIZE_LIMIT;

use common::{cookie_pair, location, set_cookie, spawn_app};

#[tokio::test]
async fn test_foo_bar() {
    let app = spawn_app().await;

    let body: Value = app
        .get("/foo-bar/")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response JSON");

    assert_eq!(body, json!({ "foo": "bar", "spam": "eggs" }));
}

#[tokio::test]
async fn test_hello_pluralizes_products() {
    let app = spawn_app().await;

    let one = app
        .get("/hello/?items=1")
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(one, "<h1>welcome Hello World!</h1>\n<h2>product</h2>");

    let many = app
        .get("/hello/?items=3")
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(many, "<h1>welcome Hello World!</h1>\n<h2>3 products</h2>");
}

#[tokio::test]
async fn test_cookie_round_trip() {
    let app = spawn_app().await;
    let root = app.create_superuser("root").await;
    let alice = app.create_user("alice").await;

    let body = app
        .get("/cookie/get")
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.starts_with("Cookie value 'default_value' + "));

    let response = app
        .authed(app.get("/cookie/set"), alice)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .authed(app.get("/cookie/set"), root)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response, "fizz").expect("No fizz cookie set");
    assert!(cookie.contains("Max-Age=3600"));
    assert_eq!(response.text().await.expect("Failed to read body"), "Cookie_set");

    let body = app
        .get("/cookie/get")
        .header(header::COOKIE, cookie_pair(&cookie))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert!(body.starts_with("Cookie value 'buzz' + "));
}

#[tokio::test]
async fn test_session_requires_permission() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;

    let response = app
        .get("/session/set")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=/session/set");

    let response = app
        .authed(app.get("/session/set"), alice)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.grant(alice, Permission::ViewProfile).await;
    let response = app
        .authed(app.get("/session/set"), alice)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    let session = set_cookie(&response, "sessionid").expect("No session cookie set");
    assert_eq!(response.text().await.expect("Failed to read body"), "Session Set!");

    let body = app
        .authed(app.get("/session/get"), alice)
        .header(header::COOKIE, cookie_pair(&session))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(body, "Session value: 'spameggs'");

    let body = app
        .authed(app.get("/session/get"), alice)
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");
    assert_eq!(body, "Session value: 'default value'");
}

#[tokio::test]
async fn test_query_params_are_concatenated() {
    let app = spawn_app().await;

    let body: Value = app
        .get("/req/get/?a=12&b=34")
        .header(header::USER_AGENT, "integration-test")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response JSON");

    assert_eq!(body, json!({ "a": "12", "b": "34", "result": "1234" }));
}

#[tokio::test]
async fn test_upload_is_stored_and_served() {
    let app = spawn_app().await;

    let form = Form::new().part(
        "file",
        Part::bytes(b"hello".to_vec()).file_name("note.txt"),
    );
    let body: Value = app
        .post("/req/upload/")
        .multipart(form)
        .send()
        .await
        .expect("Failed to send upload request")
        .json()
        .await
        .expect("Failed to parse response JSON");
    assert_eq!(body["message"], "File saved successfully");
    assert_eq!(body["path"], "uploads/note.txt");

    let response = app
        .get("/media/uploads/note.txt")
        .send()
        .await
        .expect("Failed to send media request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .expect("Bad content type")
        .starts_with("text/plain"));
    assert_eq!(response.text().await.expect("Failed to read media"), "hello");

    let response = app
        .get("/media/uploads/missing.txt")
        .send()
        .await
        .expect("Failed to send media request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_over_ceiling_is_refused_with_message() {
    let app = spawn_app().await;

    let form = Form::new().part(
        "file",
        Part::bytes(vec![b'x'; UPLOAD_SIZE_LIMIT + 1]).file_name("big.bin"),
    );
    let response = app
        .post("/req/upload/")
        .multipart(form)
        .send()
        .await
        .expect("Failed to send upload request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse response JSON");
    assert_eq!(body["message"], "Unable to upload file more than 10 (Mb)");
    assert!(body.get("path").is_none());
    assert!(!app.state.config.media_root.join("uploads/big.bin").exists());
}

#[tokio::test]
async fn test_counters_track_requests() {
    let app = spawn_app().await;

    app.get("/foo-bar/")
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = app
        .get("/req/counters/")
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response JSON");

    assert_eq!(body["requests_count"], 2);
    assert_eq!(body["responses_count"], 1);
    assert_eq!(body["exceptions_count"], 0);
}

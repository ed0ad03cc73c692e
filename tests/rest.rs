mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, TestApp};

async fn create_product(app: &TestApp, user_id: i32, name: &str, price: &str) -> Value {
    let response = app
        .authed(app.post("/api/products/"), user_id)
        .json(&json!({ "name": name, "price": price }))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.expect("Failed to parse created product")
}

async fn get_json(app: &TestApp, path: &str) -> Value {
    app.get(path)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response JSON")
}

#[tokio::test]
async fn test_anonymous_write_is_unauthorized() {
    let app = spawn_app().await;

    let response = app
        .post("/api/products/")
        .json(&json!({ "name": "Lamp", "price": "1" }))
        .send()
        .await
        .expect("Failed to send create request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_product_list_filters_orders_and_pages() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    create_product(&app, alice, "Chair", "30").await;
    create_product(&app, alice, "Table", "120").await;
    create_product(&app, alice, "Armchair", "80").await;

    let body = get_json(&app, "/api/products/?search=chair&ordering=-price").await;
    let names: Vec<&str> = body
        .as_array()
        .expect("list is not an array")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Armchair", "Chair"]);

    let body = get_json(&app, "/api/products/?limit=2").await;
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["previous"], Value::Null);
    assert_eq!(body["next"], "/api/products/?limit=2&offset=2");

    let body = get_json(&app, "/api/products/?price=120.00").await;
    assert_eq!(body[0]["name"], "Table");
}

#[tokio::test]
async fn test_product_list_is_served_stale_within_cache_window() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    create_product(&app, alice, "Chair", "30").await;

    let first = get_json(&app, "/api/products/").await;
    assert_eq!(first.as_array().map(Vec::len), Some(1));

    create_product(&app, alice, "Table", "120").await;

    let second = get_json(&app, "/api/products/").await;
    assert_eq!(second, first);

    let fresh = get_json(&app, "/api/products/?ordering=name").await;
    assert_eq!(fresh.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_product_destroy_archives() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let created = create_product(&app, alice, "Lamp", "10").await;
    let id = created["pk"].as_i64().expect("Product has no pk");

    let response = app
        .authed(app.delete(&format!("/api/products/{id}/")), bob)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .authed(app.delete(&format!("/api/products/{id}/")), alice)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = get_json(&app, &format!("/api/products/{id}/")).await;
    assert_eq!(body["archived"], true);
}

#[tokio::test]
async fn test_patch_keeps_other_fields() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let created = create_product(&app, alice, "Lamp", "10").await;
    let id = created["pk"].as_i64().expect("Product has no pk");

    let response = app
        .authed(app.patch(&format!("/api/products/{id}/")), alice)
        .json(&json!({ "price": 12.5 }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse product");
    assert_eq!(body["name"], "Lamp");
    assert_eq!(body["price"], "12.50");

    let response = app
        .authed(app.put(&format!("/api/products/{id}/")), alice)
        .json(&json!({ "price": 3 }))
        .send()
        .await
        .expect("Failed to send put request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_viewset_crud() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let lamp = create_product(&app, alice, "Lamp", "10").await;

    let response = app
        .authed(app.post("/api/orders/"), alice)
        .json(&json!({ "promocode": "AAA", "products": [lamp["pk"]] }))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.expect("Failed to parse order");
    assert_eq!(order["user"], alice);
    let id = order["pk"].as_i64().expect("Order has no pk");

    let body = get_json(&app, "/api/orders/?promocode=AAA").await;
    assert_eq!(body[0]["pk"], id);

    let response = app
        .authed(app.patch(&format!("/api/orders/{id}/")), bob)
        .json(&json!({ "promocode": "BBB" }))
        .send()
        .await
        .expect("Failed to send patch request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .authed(app.delete(&format!("/api/orders/{id}/")), alice)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/orders/{id}/"))
        .send()
        .await
        .expect("Failed to send retrieve request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_page_window_is_clamped() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    create_product(&app, alice, "Chair", "30").await;

    let response = app
        .get("/api/products/?limit=18446744073709551615&offset=1")
        .send()
        .await
        .expect("Failed to send list request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse page");
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["next"], Value::Null);
}

#[tokio::test]
async fn test_created_by_comes_from_the_caller() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let response = app
        .authed(app.post("/api/products/"), alice)
        .json(&json!({ "name": "Lamp", "price": "10", "created_by": bob }))
        .send()
        .await
        .expect("Failed to send create request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse created product");
    assert_eq!(body["created_by"], alice);
}

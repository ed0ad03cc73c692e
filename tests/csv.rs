mod common;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{location, spawn_app, TestApp};

fn csv_form(field: &str, content: &str) -> Form {
    Form::new().part(
        field.to_string(),
        Part::bytes(content.as_bytes().to_vec())
            .file_name("data.csv")
            .mime_str("text/csv")
            .expect("Failed to set part mime type"),
    )
}

async fn product_export(app: &TestApp) -> Value {
    app.get("/shop/products/export/")
        .send()
        .await
        .expect("Failed to send export request")
        .json()
        .await
        .expect("Failed to parse export")
}

#[tokio::test]
async fn test_admin_product_import_owned_by_importer() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;

    let response = app
        .authed(app.post("/admin/shop/product/import-products-csv/"), staff)
        .multipart(csv_form(
            "csv_file",
            "name,description,price,discount\nLamp,Bright,12.50,0\nChair,Soft,30,5\n",
        ))
        .send()
        .await
        .expect("Failed to send import request");

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/admin/shop/product/");

    let products: Value = app
        .get("/api/products/?ordering=price")
        .send()
        .await
        .expect("Failed to send list request")
        .json()
        .await
        .expect("Failed to parse product list");
    assert_eq!(products[0]["name"], "Lamp");
    assert_eq!(products[0]["price"], "12.50");
    assert_eq!(products[1]["discount"], 5);
    assert_eq!(products[1]["created_by"], staff);
}

#[tokio::test]
async fn test_unknown_column_leaves_table_unchanged() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;

    let response = app
        .authed(app.post("/admin/shop/product/import-products-csv/"), staff)
        .multipart(csv_form("csv_file", "name,price,colour\nLamp,12.50,red\n"))
        .send()
        .await
        .expect("Failed to send import request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(product_export(&app).await, json!({ "products": [] }));
}

#[tokio::test]
async fn test_bad_row_aborts_whole_import() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;

    let response = app
        .authed(app.post("/admin/shop/product/import-products-csv/"), staff)
        .multipart(csv_form(
            "csv_file",
            "name,price\nLamp,12.50\nChair,cheap\n",
        ))
        .send()
        .await
        .expect("Failed to send import request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(product_export(&app).await, json!({ "products": [] }));
}

#[tokio::test]
async fn test_admin_import_is_staff_only() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;

    let response = app
        .authed(app.post("/admin/shop/product/import-products-csv/"), alice)
        .multipart(csv_form("csv_file", "name,price\nLamp,1\n"))
        .send()
        .await
        .expect("Failed to send import request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_order_upload_returns_created_rows() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;
    let alice = app.create_user("alice").await;
    app.authed(app.post("/api/products/"), alice)
        .json(&json!({ "name": "Lamp", "price": "10" }))
        .send()
        .await
        .expect("Failed to send create request");
    app.authed(app.post("/api/products/"), alice)
        .json(&json!({ "name": "Chair", "price": "20" }))
        .send()
        .await
        .expect("Failed to send create request");

    let csv = format!(
        "delivery_address,promocode,user,products\nStreet 1,SALE,{alice},2 1\n,,{alice},\n"
    );
    let response = app
        .authed(app.post("/api/orders/upload_csv/"), staff)
        .multipart(csv_form("file", &csv))
        .send()
        .await
        .expect("Failed to send upload request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse created orders");
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["products"], json!([1, 2]));
    assert_eq!(body[0]["user"], alice);
    assert_eq!(body[1]["delivery_address"], Value::Null);
}

#[tokio::test]
async fn test_order_upload_with_unknown_user_creates_nothing() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;
    let alice = app.create_user("alice").await;

    let csv = format!("promocode,user\nA,{alice}\nB,999\n");
    let response = app
        .authed(app.post("/api/orders/upload_csv/"), staff)
        .multipart(csv_form("file", &csv))
        .send()
        .await
        .expect("Failed to send upload request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let orders: Value = app
        .get("/api/orders/")
        .send()
        .await
        .expect("Failed to send list request")
        .json()
        .await
        .expect("Failed to parse order list");
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_order_upload_for_other_users_is_staff_only() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;

    let csv = format!("promocode,user\nGIFT,{bob}\n");
    let response = app
        .authed(app.post("/api/orders/upload_csv/"), alice)
        .multipart(csv_form("file", &csv))
        .send()
        .await
        .expect("Failed to send upload request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let orders: Value = app
        .get("/api/orders/")
        .send()
        .await
        .expect("Failed to send list request")
        .json()
        .await
        .expect("Failed to parse order list");
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_download_csv_applies_list_filters() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    for (name, price) in [("Lamp", "1"), ("Chair", "1"), ("Desk lamp", "5")] {
        app.authed(app.post("/api/products/"), alice)
            .json(&json!({ "name": name, "price": price }))
            .send()
            .await
            .expect("Failed to send create request");
    }

    let body = app
        .get("/api/products/download_csv/?search=lamp&ordering=-price")
        .send()
        .await
        .expect("Failed to send download request")
        .text()
        .await
        .expect("Failed to read CSV");
    assert_eq!(
        body,
        "name,description,price,discount\nDesk lamp,,5.00,0\nLamp,,1.00,0\n"
    );
}

#[tokio::test]
async fn test_product_download_csv() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    app.authed(app.post("/api/products/"), alice)
        .json(&json!({ "name": "Lamp", "description": "Bright", "price": "12.5" }))
        .send()
        .await
        .expect("Failed to send create request");

    let response = app
        .get("/api/products/download_csv/")
        .send()
        .await
        .expect("Failed to send download request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .expect("Bad content type")
        .starts_with("text/csv"));
    assert!(response.headers()["content-disposition"]
        .to_str()
        .expect("Bad content disposition")
        .starts_with("attachment"));

    let body = response.text().await.expect("Failed to read CSV");
    assert_eq!(body, "name,description,price,discount\nLamp,Bright,12.50,0\n");
}

#[tokio::test]
async fn test_admin_export_selected_products() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;
    for name in ["Lamp", "Chair", "Table"] {
        app.authed(app.post("/api/products/"), staff)
            .json(&json!({ "name": name, "price": "1" }))
            .send()
            .await
            .expect("Failed to send create request");
    }

    let body = app
        .authed(app.get("/admin/shop/product/export-csv/?ids=1,3"), staff)
        .send()
        .await
        .expect("Failed to send export request")
        .text()
        .await
        .expect("Failed to read CSV");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,name,description,price"));
    assert!(lines[1].starts_with("1,Lamp,"));
    assert!(lines[2].starts_with("3,Table,"));
}

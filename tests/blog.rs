mod common;

use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use shopsite::core::blog;
use shopsite::forms::ArticleFields;

use common::{spawn_app, TestApp};

/// One author, one category, two tags, a published `about_animals` and a draft.
async fn seed_blog(app: &TestApp) -> (i32, i32, i32) {
    let db = app.state.db.as_ref();
    let author = blog::create_author(db, "Ann", "Writes about cats")
        .await
        .expect("Failed to create author");
    let category = blog::create_category(db, "Nature")
        .await
        .expect("Failed to create category");
    blog::create_tag(db, "cats").await.expect("Failed to create tag");
    blog::create_tag(db, "dogs").await.expect("Failed to create tag");
    let written = Utc.with_ymd_and_hms(2022, 10, 1, 0, 0, 0).unwrap();
    let (article, _) = blog::ensure_article_with_all_tags(
        db,
        "about_animals",
        "animals",
        written,
        author.id,
        category.id,
    )
    .await
    .expect("Failed to create article");
    blog::create_article(
        db,
        ArticleFields {
            title: "draft".to_owned(),
            content: String::new(),
            pub_date: None,
            author_id: author.id,
            category_id: category.id,
            tags: Vec::new(),
        },
    )
    .await
    .expect("Failed to create article");
    let published = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    blog::publish_matching(db, "animals", published)
        .await
        .expect("Failed to publish");
    (author.id, category.id, article.id)
}

#[tokio::test]
async fn test_articles_list_only_published() {
    let app = spawn_app().await;
    let (_, _, article) = seed_blog(&app).await;

    let body: Value = app
        .get("/articles/")
        .send()
        .await
        .expect("Failed to send articles request")
        .json()
        .await
        .expect("Failed to parse articles");

    let articles = body.as_array().expect("articles is not a list");
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["pk"], article);
    assert_eq!(articles[0]["author"], "Ann");
    assert_eq!(articles[0]["category"], "Nature");
    assert_eq!(articles[0]["tags"], json!(["cats", "dogs"]));
    assert!(articles[0].get("content").is_none());
}

#[tokio::test]
async fn test_article_detail() {
    let app = spawn_app().await;
    let (_, _, article) = seed_blog(&app).await;

    let body: Value = app
        .get(&format!("/articles/{article}/"))
        .send()
        .await
        .expect("Failed to send article request")
        .json()
        .await
        .expect("Failed to parse article");
    assert_eq!(body["title"], "about_animals");
    assert_eq!(body["author"]["name"], "Ann");
    assert_eq!(body["tags"].as_array().map(Vec::len), Some(2));

    let response = app
        .get("/articles/999/")
        .send()
        .await
        .expect("Failed to send article request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_latest_articles_feed() {
    let app = spawn_app().await;
    let (_, _, article) = seed_blog(&app).await;

    let response = app
        .get("/articles/latest/feed/")
        .send()
        .await
        .expect("Failed to send feed request");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .expect("Bad content type")
        .starts_with("application/rss+xml"));

    let body = response.text().await.expect("Failed to read feed");
    assert!(body.contains("<rss"));
    assert!(body.contains("<title>about_animals</title>"));
    assert!(body.contains(&app.url(&format!("/articles/{article}/"))));
    assert!(!body.contains("<title>draft</title>"));
}

#[tokio::test]
async fn test_sitemap_lists_products_and_articles() {
    let app = spawn_app().await;
    let (_, _, article) = seed_blog(&app).await;
    let alice = app.create_user("alice").await;
    let created: Value = app
        .authed(app.post("/api/products/"), alice)
        .json(&json!({ "name": "Lamp", "price": "10" }))
        .send()
        .await
        .expect("Failed to send create request")
        .json()
        .await
        .expect("Failed to parse product");
    let product = created["pk"].as_i64().expect("Product has no pk");

    let body = app
        .get("/sitemap.xml")
        .send()
        .await
        .expect("Failed to send sitemap request")
        .text()
        .await
        .expect("Failed to read sitemap");

    let product_loc = app.url(&format!("/shop/products/{product}/"));
    let article_loc = app.url(&format!("/articles/{article}/"));
    assert!(body.contains(&format!("<loc>{product_loc}</loc>")));
    assert!(body.contains(&format!("<loc>{article_loc}</loc>")));
    assert!(body.contains("<changefreq>always</changefreq>"));
    assert!(body.contains("<changefreq>never</changefreq>"));
    assert!(body.find(&product_loc) < body.find(&article_loc));
}

#[tokio::test]
async fn test_deleting_author_cascades_to_articles() {
    let app = spawn_app().await;
    let (author, _, _) = seed_blog(&app).await;
    let staff = app.create_staff("manager").await;
    let alice = app.create_user("alice").await;

    let response = app
        .authed(app.post(&format!("/admin/blog/author/{author}/delete/")), alice)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .authed(app.post(&format!("/admin/blog/author/{author}/delete/")), staff)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body: Value = app
        .get("/articles/")
        .send()
        .await
        .expect("Failed to send articles request")
        .json()
        .await
        .expect("Failed to parse articles");
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_user_with_orders_cannot_be_deleted() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;
    let alice = app.create_user("alice").await;
    app.authed(app.post("/shop/orders/create/"), alice)
        .json(&json!({ "promocode": "X" }))
        .send()
        .await
        .expect("Failed to send create order request");

    let response = app
        .authed(app.post(&format!("/admin/auth/user/{alice}/delete/")), staff)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_manage_articles() {
    let app = spawn_app().await;
    let (author, category, _) = seed_blog(&app).await;
    let staff = app.create_staff("manager").await;
    let alice = app.create_user("alice").await;
    let payload = json!({
        "title": "Dogs",
        "content": "woof",
        "pub_date": "2024-01-02T03:04:05Z",
        "author": author,
        "category": category,
        "tags": [2],
    });

    let response = app
        .authed(app.post("/admin/blog/article/add/"), alice)
        .json(&payload)
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .authed(app.post("/admin/blog/article/add/"), staff)
        .json(&payload)
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.expect("Failed to parse article");
    let id = created["pk"].as_i64().expect("Article has no pk");
    assert_eq!(created["tags"][0]["name"], "dogs");
    assert_eq!(created["pub_date"], "2024-01-02T03:04:05Z");

    let response = app
        .authed(app.post(&format!("/admin/blog/article/{id}/change/")), staff)
        .form(&[
            ("title", "Dogs and cats"),
            ("content", "woof meow"),
            ("author", author.to_string().as_str()),
            ("category", category.to_string().as_str()),
            ("tags", "1"),
            ("tags", "2"),
        ])
        .send()
        .await
        .expect("Failed to send change request");
    assert_eq!(response.status(), StatusCode::OK);
    let changed: Value = response.json().await.expect("Failed to parse article");
    assert_eq!(changed["title"], "Dogs and cats");
    assert_eq!(changed["pub_date"], Value::Null);
    assert_eq!(changed["tags"].as_array().map(Vec::len), Some(2));

    let rows: Value = app
        .authed(app.get("/admin/blog/article/"), staff)
        .send()
        .await
        .expect("Failed to send changelist request")
        .json()
        .await
        .expect("Failed to parse changelist");
    let titles: Vec<&str> = rows
        .as_array()
        .expect("changelist is not a list")
        .iter()
        .filter_map(|row| row["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Dogs and cats", "about_animals", "draft"]);

    let response = app
        .authed(app.post(&format!("/admin/blog/article/{id}/delete/")), staff)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/articles/{id}/"))
        .send()
        .await
        .expect("Failed to send article request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .authed(app.post(&format!("/admin/blog/article/{id}/delete/")), staff)
        .send()
        .await
        .expect("Failed to send delete request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_article_with_unknown_author_is_rejected() {
    let app = spawn_app().await;
    let (_, category, _) = seed_blog(&app).await;
    let staff = app.create_staff("manager").await;

    let response = app
        .authed(app.post("/admin/blog/article/add/"), staff)
        .json(&json!({ "title": "Ghost", "author": 999, "category": category }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse errors");
    assert!(body.to_string().contains("author"));
}

#[tokio::test]
async fn test_staff_add_authors_categories_and_tags() {
    let app = spawn_app().await;
    let staff = app.create_staff("manager").await;

    let response = app
        .authed(app.post("/admin/blog/author/add/"), staff)
        .json(&json!({ "name": " Bo ", "bio": "Dogs" }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let author: Value = response.json().await.expect("Failed to parse author");
    assert_eq!(author["name"], "Bo");

    let response = app
        .authed(app.post("/admin/blog/category/add/"), staff)
        .form(&[("name", "Pets")])
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: Value = response.json().await.expect("Failed to parse category");

    let response = app
        .authed(app.post("/admin/blog/tag/add/"), staff)
        .json(&json!({ "name": "x".repeat(21) }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .authed(app.post("/admin/blog/tag/add/"), staff)
        .json(&json!({ "name": "puppies" }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let tag: Value = response.json().await.expect("Failed to parse tag");

    let response = app
        .authed(app.post("/admin/blog/article/add/"), staff)
        .json(&json!({
            "title": "Puppies",
            "pub_date": "2024-03-01",
            "author": author["pk"],
            "category": category["pk"],
            "tags": [tag["pk"]],
        }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let listed: Value = app
        .get("/articles/")
        .send()
        .await
        .expect("Failed to send articles request")
        .json()
        .await
        .expect("Failed to parse articles");
    assert_eq!(listed[0]["author"], "Bo");
    assert_eq!(listed[0]["tags"], json!(["puppies"]));

    let response = app
        .post("/admin/blog/tag/add/")
        .json(&json!({ "name": "kittens" }))
        .send()
        .await
        .expect("Failed to send add request");
    assert_eq!(response.status(), StatusCode::FOUND);
}

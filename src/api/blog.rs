use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Json, Router,
};

use crate::api::{base_url, xml_response};
use crate::core::{blog, products};
use crate::error::AppError;
use crate::feeds::{self, Channel, FEED_SIZE};
use crate::serializers::{ArticleDetail, ArticleListItem};
use crate::AppState;

pub fn blog_router() -> Router<AppState> {
    Router::new()
        .route("/articles/", get(list_articles))
        .route("/articles/latest/feed/", get(latest_articles_feed))
        .route("/articles/:id/", get(article_detail))
        .route("/sitemap.xml", get(sitemap))
}

async fn list_articles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArticleListItem>>, AppError> {
    Ok(Json(blog::published(state.db.as_ref()).await?))
}

async fn article_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ArticleDetail>, AppError> {
    Ok(Json(blog::detail(state.db.as_ref(), id).await?))
}

async fn latest_articles_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let base = base_url(&headers);
    let latest = blog::latest(state.db.as_ref(), Some(FEED_SIZE)).await?;
    let items: Vec<_> = latest.iter().map(|a| feeds::article_item(&base, a)).collect();
    let channel = Channel {
        title: "Blog articles (latest)",
        link: format!("{base}/articles/"),
        description: "Updates on changes and additions of blog articles",
    };
    Ok(xml_response(
        "application/rss+xml; charset=utf-8",
        feeds::render_rss(&channel, &items)?,
    ))
}

/// Shop products first, then published articles.
async fn sitemap(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let base = base_url(&headers);
    let db = state.db.as_ref();

    let mut shop = products::list_active(db).await?;
    shop.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let articles = blog::latest(db, None).await?;

    let entries: Vec<_> = shop
        .iter()
        .map(|p| feeds::product_entry(&base, p))
        .chain(articles.iter().map(|a| feeds::article_entry(&base, a)))
        .collect();
    Ok(xml_response(
        "application/xml; charset=utf-8",
        feeds::render_sitemap(&entries)?,
    ))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::require_staff;
use crate::access::Actor;
use crate::api::extract::FormOrJson;
use crate::core::blog;
use crate::entities::{article, author, category, tag};
use crate::error::AppError;
use crate::forms::{ArticleForm, AuthorForm, NameForm};
use crate::serializers::ArticleDetail;
use crate::AppState;

const CHANGELIST: &str = "/admin/blog/article/";
const CATEGORY_NAME_MAX: usize = 40;
const TAG_NAME_MAX: usize = 20;

#[derive(Debug, Serialize)]
pub struct ArticleChangelistRow {
    pk: i32,
    title: String,
    content: String,
    pub_date: Option<DateTime<Utc>>,
    author: i32,
    category: i32,
}

impl From<article::Model> for ArticleChangelistRow {
    fn from(value: article::Model) -> Self {
        ArticleChangelistRow {
            pk: value.id,
            title: value.title,
            content: value.content,
            pub_date: value.pub_date,
            author: value.author_id,
            category: value.category_id,
        }
    }
}

pub async fn changelist(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<ArticleChangelistRow>>, AppError> {
    require_staff(&actor, CHANGELIST)?;
    let found = blog::changelist(state.db.as_ref()).await?;
    Ok(Json(found.into_iter().map(ArticleChangelistRow::from).collect()))
}

pub async fn add_article(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<ArticleForm>,
) -> Result<(StatusCode, Json<ArticleDetail>), AppError> {
    require_staff(&actor, "/admin/blog/article/add/")?;
    let created = blog::create_article(state.db.as_ref(), form.clean()?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn change_article(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<ArticleForm>,
) -> Result<Json<ArticleDetail>, AppError> {
    require_staff(&actor, &format!("/admin/blog/article/{id}/change/"))?;
    let updated = blog::update_article(state.db.as_ref(), id, form.clean()?).await?;
    Ok(Json(updated))
}

pub async fn delete_article(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_staff(&actor, &format!("/admin/blog/article/{id}/delete/"))?;
    blog::delete_article(state.db.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_author(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<AuthorForm>,
) -> Result<(StatusCode, Json<author::Model>), AppError> {
    require_staff(&actor, "/admin/blog/author/add/")?;
    let form = form.clean()?;
    let created = blog::create_author(state.db.as_ref(), &form.name, &form.bio).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Also removes every article written by the author.
pub async fn delete_author(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_staff(&actor, &format!("/admin/blog/author/{id}/delete/"))?;
    blog::delete_author(state.db.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_category(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<NameForm>,
) -> Result<(StatusCode, Json<category::Model>), AppError> {
    require_staff(&actor, "/admin/blog/category/add/")?;
    let name = form.clean(CATEGORY_NAME_MAX)?;
    let created = blog::create_category(state.db.as_ref(), &name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Also removes every article filed under the category.
pub async fn delete_category(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_staff(&actor, &format!("/admin/blog/category/{id}/delete/"))?;
    blog::delete_category(state.db.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_tag(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<NameForm>,
) -> Result<(StatusCode, Json<tag::Model>), AppError> {
    require_staff(&actor, "/admin/blog/tag/add/")?;
    let name = form.clean(TAG_NAME_MAX)?;
    let created = blog::create_tag(state.db.as_ref(), &name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

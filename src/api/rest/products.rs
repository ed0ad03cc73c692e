use axum::{
    extract::{Multipart, OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::{list_body, parse_flag, parse_param, require_api_user, window};
use crate::access::{can_change_product, Actor};
use crate::api::csv_attachment;
use crate::api::extract::{FormOrJson, MultipartForm};
use crate::core::{parse_ordering, SortKey, Window};
use crate::core::products::{self, ProductFilter, ORDERING_FIELDS};
use crate::csv_exchange::{self, ProductRow};
use crate::error::AppError;
use crate::forms::{ProductForm, ProductPatch};
use crate::serializers::ProductSerializer;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    search: Option<String>,
    name: Option<String>,
    description: Option<String>,
    price: Option<String>,
    discount: Option<String>,
    archived: Option<String>,
    ordering: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl ProductListQuery {
    fn filter(&self) -> Result<(ProductFilter, Vec<SortKey>), AppError> {
        let filter = ProductFilter {
            search: self.search.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            price: parse_param("price", self.price.as_deref())?,
            discount: parse_param("discount", self.discount.as_deref())?,
            archived: parse_flag("archived", self.archived.as_deref())?,
        };
        let ordering = parse_ordering(self.ordering.as_deref(), ORDERING_FIELDS);
        Ok((filter, ordering))
    }
}

/// Cached per request URI; writes do not invalidate it.
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Value>, AppError> {
    let key = uri.to_string();
    if let Some(cached) = state.caches.lists.get(&key) {
        return Ok(Json(cached));
    }

    let (filter, ordering) = query.filter()?;
    let window = window(query.limit, query.offset);

    let (count, found) = products::filtered(state.db.as_ref(), &filter, &ordering, window).await?;
    let results: Vec<ProductSerializer> = found.iter().map(ProductSerializer::from).collect();
    let body = list_body(uri.path(), uri.query(), window, count, results);

    state.caches.lists.set(key, body.clone());
    Ok(Json(body))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<ProductForm>,
) -> Result<Response, AppError> {
    let creator = require_api_user(&actor)?;
    let created = products::create(state.db.as_ref(), creator, form.clean()?).await?;
    Ok((StatusCode::CREATED, Json(ProductSerializer::from(&created))).into_response())
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductSerializer>, AppError> {
    let found = products::get(state.db.as_ref(), id).await?;
    Ok(Json(ProductSerializer::from(&found)))
}

async fn save_changes(
    state: &AppState,
    actor: &Actor,
    id: i32,
    patch: ProductPatch,
    partial: bool,
) -> Result<Json<ProductSerializer>, AppError> {
    require_api_user(actor)?;
    let found = products::get(state.db.as_ref(), id).await?;
    if !can_change_product(actor, &found) {
        return Err(AppError::Forbidden);
    }

    let base = if partial {
        ProductForm::from_model(&found)
    } else {
        ProductForm::default()
    };
    let archived = patch.archived;
    let fields = patch.apply(base).clean()?;
    let updated = products::update(state.db.as_ref(), found, fields, archived).await?;
    Ok(Json(ProductSerializer::from(&updated)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(patch): FormOrJson<ProductPatch>,
) -> Result<Json<ProductSerializer>, AppError> {
    save_changes(&state, &actor, id, patch, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(patch): FormOrJson<ProductPatch>,
) -> Result<Json<ProductSerializer>, AppError> {
    save_changes(&state, &actor, id, patch, true).await
}

/// Archives the product; the row is kept.
pub async fn destroy(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_api_user(&actor)?;
    let found = products::get(state.db.as_ref(), id).await?;
    if !can_change_product(&actor, &found) {
        return Err(AppError::Forbidden);
    }
    products::archive(state.db.as_ref(), found).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The list's search, filters and ordering apply; paging does not.
pub async fn download_csv(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Response, AppError> {
    let (filter, ordering) = query.filter()?;
    let (_, found) =
        products::filtered(state.db.as_ref(), &filter, &ordering, Window::default()).await?;
    let rows: Vec<ProductRow> = found.iter().map(ProductRow::from).collect();
    let body = csv_exchange::write_records(&rows)?;
    Ok(csv_attachment("products-export.csv", body))
}

/// Imports the `file` part; every row is created or none is.
pub async fn upload_csv(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let creator = require_api_user(&actor)?;
    let form = MultipartForm::read(multipart).await?;
    let file = form.require_file("file")?;

    let text = csv_exchange::decode(&file.data, file.charset())?;
    let rows: Vec<ProductRow> = csv_exchange::read_records(&text)?;
    let created = products::import_rows(state.db.as_ref(), creator, rows).await?;

    let body: Vec<ProductSerializer> = created.iter().map(ProductSerializer::from).collect();
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

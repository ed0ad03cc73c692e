use axum::{
    extract::{Multipart, OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::{list_body, parse_param, require_api_user, window};
use crate::access::{can_change_order, can_delete_order, is_admin, Actor};
use crate::api::csv_attachment;
use crate::api::extract::{FormOrJson, MultipartForm};
use crate::core::orders::{self, OrderFilter, ORDERING_FIELDS};
use crate::core::{parse_ordering, SortKey, Window};
use crate::csv_exchange::{self, OrderRow};
use crate::error::AppError;
use crate::forms::{OrderForm, OrderPatch};
use crate::serializers::OrderSerializer;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    delivery_address: Option<String>,
    promocode: Option<String>,
    products: Option<String>,
    ordering: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

impl OrderListQuery {
    fn filter(&self) -> Result<(OrderFilter, Vec<SortKey>), AppError> {
        let filter = OrderFilter {
            delivery_address: non_empty(self.delivery_address.clone()),
            promocode: non_empty(self.promocode.clone()),
            product: parse_param("products", self.products.as_deref())?,
        };
        let ordering = parse_ordering(self.ordering.as_deref(), ORDERING_FIELDS);
        Ok((filter, ordering))
    }
}

/// Cached per request URI; writes do not invalidate it.
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Value>, AppError> {
    let key = uri.to_string();
    if let Some(cached) = state.caches.lists.get(&key) {
        return Ok(Json(cached));
    }

    let (filter, ordering) = query.filter()?;
    let window = window(query.limit, query.offset);

    let (count, found) = orders::filtered(state.db.as_ref(), &filter, &ordering, window).await?;
    let results: Vec<OrderSerializer> = found
        .iter()
        .map(|(order, products)| OrderSerializer::new(order, products))
        .collect();
    let body = list_body(uri.path(), uri.query(), window, count, results);

    state.caches.lists.set(key, body.clone());
    Ok(Json(body))
}

/// The owner is always the caller.
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<OrderForm>,
) -> Result<Response, AppError> {
    let user_id = require_api_user(&actor)?;
    let (created, products) = orders::create(state.db.as_ref(), user_id, form.clean()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderSerializer::new(&created, &products)),
    )
        .into_response())
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderSerializer>, AppError> {
    let found = orders::get(state.db.as_ref(), id).await?;
    let products = orders::products_of(state.db.as_ref(), &found).await?;
    Ok(Json(OrderSerializer::new(&found, &products)))
}

async fn save_changes(
    state: &AppState,
    actor: &Actor,
    id: i32,
    patch: OrderPatch,
    partial: bool,
) -> Result<Json<OrderSerializer>, AppError> {
    require_api_user(actor)?;
    let found = orders::get(state.db.as_ref(), id).await?;
    if !can_change_order(actor, &found) {
        return Err(AppError::Forbidden);
    }

    let base = if partial {
        let current = orders::products_of(state.db.as_ref(), &found).await?;
        OrderForm::from_model(&found, current.iter().map(|p| p.id).collect())
    } else {
        OrderForm::default()
    };
    let form = patch.apply(base).clean()?;
    let (updated, products) = orders::update(state.db.as_ref(), found, form).await?;
    Ok(Json(OrderSerializer::new(&updated, &products)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(patch): FormOrJson<OrderPatch>,
) -> Result<Json<OrderSerializer>, AppError> {
    save_changes(&state, &actor, id, patch, false).await
}

pub async fn partial_update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(patch): FormOrJson<OrderPatch>,
) -> Result<Json<OrderSerializer>, AppError> {
    save_changes(&state, &actor, id, patch, true).await
}

pub async fn destroy(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    require_api_user(&actor)?;
    let found = orders::get(state.db.as_ref(), id).await?;
    if !can_delete_order(&actor, &found) {
        return Err(AppError::Forbidden);
    }
    orders::delete(state.db.as_ref(), found).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The list's filters and ordering apply; paging does not.
pub async fn download_csv(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, AppError> {
    let (filter, ordering) = query.filter()?;
    let (_, found) =
        orders::filtered(state.db.as_ref(), &filter, &ordering, Window::default()).await?;
    let rows: Vec<OrderRow> = found
        .iter()
        .map(|(order, products)| OrderRow::new(order, products))
        .collect();
    let body = csv_exchange::write_records(&rows)?;
    Ok(csv_attachment("orders-export.csv", body))
}

/// Imports the `file` part; every row is created or none is.
pub async fn upload_csv(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<Response, AppError> {
    require_api_user(&actor)?;
    if !is_admin(&actor) {
        return Err(AppError::Forbidden);
    }
    let form = MultipartForm::read(multipart).await?;
    let file = form.require_file("file")?;

    let text = csv_exchange::decode(&file.data, file.charset())?;
    let rows: Vec<OrderRow> = csv_exchange::read_records(&text)?;
    let created = orders::import_rows(state.db.as_ref(), rows).await?;

    let body: Vec<OrderSerializer> = created
        .iter()
        .map(|(order, products)| OrderSerializer::new(order, products))
        .collect();
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

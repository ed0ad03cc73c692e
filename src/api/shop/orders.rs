use axum::{
    extract::{Multipart, Path, State},
    response::Response,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::access::{can_change_order, can_delete_order, Actor, Permission};
use crate::api::extract::{FormOrJson, MultipartForm};
use crate::api::found;
use crate::core::{orders, users};
use crate::error::AppError;
use crate::forms::OrderForm;
use crate::serializers::{OrderDetail, OrderExportRow, OrderSerializer, UserBrief};
use crate::storage;
use crate::AppState;

const ORDER_EXPORT_KEY: &str = "orders_data_export";

pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<OrderDetail>>, AppError> {
    actor.require_login("/shop/orders/")?;

    let rows = orders::list_all(state.db.as_ref()).await?;
    let details = rows
        .iter()
        .map(|(order, owner, products)| {
            owner
                .as_ref()
                .map(|owner| OrderDetail::new(order, owner, products))
                .ok_or_else(|| AppError::Internal(format!("order {} has no owner", order.id)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(details))
}

/// The target user must exist before anything else is checked.
pub async fn user_orders(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let owner = users::get(state.db.as_ref(), user_id).await?;
    actor.require_login(&format!("/shop/users/{user_id}/orders/"))?;

    let rows = orders::for_user(state.db.as_ref(), user_id).await?;
    let serialized: Vec<OrderSerializer> = rows
        .iter()
        .map(|(order, products)| OrderSerializer::new(order, products))
        .collect();
    Ok(Json(json!({
        "owner": UserBrief::from(&owner),
        "orders": serialized,
    })))
}

pub async fn order_detail(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    actor.require_perm(Permission::ViewOrder, &format!("/shop/orders/{id}/"))?;

    let (order, owner, products) = orders::detail(state.db.as_ref(), id).await?;
    Ok(Json(OrderDetail::new(&order, &owner, &products)))
}

pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<OrderForm>,
) -> Result<Response, AppError> {
    let user_id = actor.require_login("/shop/orders/create/")?;

    orders::create(state.db.as_ref(), user_id, form.clean()?).await?;
    Ok(found("/shop/orders/"))
}

pub async fn update_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<OrderForm>,
) -> Result<Response, AppError> {
    let order = orders::get(state.db.as_ref(), id).await?;
    actor.require(
        can_change_order(&actor, &order),
        &format!("/shop/orders/{id}/update/"),
    )?;

    orders::update(state.db.as_ref(), order, form.clean()?).await?;
    Ok(found(&format!("/shop/orders/{id}/")))
}

pub async fn delete_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let order = orders::get(state.db.as_ref(), id).await?;
    actor.require(
        can_delete_order(&actor, &order),
        &format!("/shop/orders/{id}/delete/"),
    )?;

    orders::delete(state.db.as_ref(), order).await?;
    Ok(found("/shop/orders/"))
}

pub async fn upload_receipt(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let order = orders::get(state.db.as_ref(), id).await?;
    actor.require(
        can_change_order(&actor, &order),
        &format!("/shop/orders/{id}/receipt/"),
    )?;

    let form = MultipartForm::read(multipart).await?;
    let receipt = form.require_file("receipt")?;
    let relative = storage::order_receipt_path(&receipt.filename);
    storage::save(&state.config.media_root, &relative, &receipt.data).await?;
    orders::set_receipt(state.db.as_ref(), order, relative).await?;

    Ok(found(&format!("/shop/orders/{id}/")))
}

/// Staff-only snapshot of every order. A miss computes, caches and returns
/// the fresh list; hits may be up to one TTL stale.
pub async fn export_orders(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Value>, AppError> {
    actor.require(actor.is_staff(), "/shop/orders/export/")?;

    if let Some(cached) = state.caches.order_export.get(ORDER_EXPORT_KEY) {
        debug!("Serving cached order export");
        return Ok(Json(cached));
    }

    let rows = orders::export_all(state.db.as_ref()).await?;
    let body = json!({ "orders": rows });
    state.caches.order_export.set(ORDER_EXPORT_KEY, body.clone());
    Ok(Json(body))
}

pub async fn export_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let key = format!("user_orders_export_{user_id}");
    if let Some(cached) = state.caches.user_order_export.get(&key) {
        return Ok(Json(cached));
    }

    users::get(state.db.as_ref(), user_id).await?;
    let rows: Vec<OrderExportRow> = orders::for_user(state.db.as_ref(), user_id)
        .await?
        .iter()
        .map(|(order, products)| OrderExportRow::new(order, products))
        .collect();
    let body = json!({ "orders": rows });
    state.caches.user_order_export.set(key, body.clone());
    Ok(Json(body))
}

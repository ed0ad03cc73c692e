use axum::{
    extract::{Multipart, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::require_staff;
use crate::access::Actor;
use crate::api::extract::MultipartForm;
use crate::api::found;
use crate::core::orders;
use crate::csv_exchange::{self, OrderRow};
use crate::error::AppError;
use crate::AppState;

const CHANGELIST: &str = "/admin/shop/order/";

#[derive(Debug, Serialize)]
pub struct OrderChangelistRow {
    pk: i32,
    delivery_address: Option<String>,
    promocode: String,
    created_at: DateTime<Utc>,
    user_verbose: String,
    products: Vec<i32>,
}

pub async fn changelist(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<OrderChangelistRow>>, AppError> {
    require_staff(&actor, CHANGELIST)?;

    let rows = orders::list_all(state.db.as_ref())
        .await?
        .into_iter()
        .map(|(order, owner, products)| OrderChangelistRow {
            pk: order.id,
            delivery_address: order.delivery_address,
            promocode: order.promocode,
            created_at: order.created_at,
            user_verbose: owner
                .as_ref()
                .map(|u| u.verbose_name().to_owned())
                .unwrap_or_default(),
            products: products.iter().map(|p| p.id).collect(),
        })
        .collect();
    Ok(Json(rows))
}

/// Creates one order per row of `csv_file`; the `user` column names the owner.
pub async fn import_orders_csv(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<Response, AppError> {
    require_staff(&actor, "/admin/shop/order/import-orders-csv/")?;

    let form = MultipartForm::read(multipart).await?;
    let file = form.require_file("csv_file")?;
    let text = csv_exchange::decode(&file.data, file.charset())?;
    let rows: Vec<OrderRow> = csv_exchange::read_records(&text)?;
    orders::import_rows(state.db.as_ref(), rows).await?;

    Ok(found(CHANGELIST))
}

use axum::{
    extract::{Multipart, Query, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::require_staff;
use crate::access::Actor;
use crate::api::extract::MultipartForm;
use crate::api::{csv_attachment, found};
use crate::core::products;
use crate::csv_exchange::{self, ProductRow, PRODUCT_ALL_FIELDS};
use crate::entities::product;
use crate::error::AppError;
use crate::forms::format_price;
use crate::AppState;

const CHANGELIST: &str = "/admin/shop/product/";
const SHORT_DESCRIPTION_CHARS: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ChangelistQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductChangelistRow {
    pk: i32,
    name: String,
    description_short: String,
    price: String,
    discount: i32,
    archived: bool,
}

impl From<&product::Model> for ProductChangelistRow {
    fn from(value: &product::Model) -> Self {
        ProductChangelistRow {
            pk: value.id,
            name: value.name.clone(),
            description_short: short_description(&value.description),
            price: format_price(value.price),
            discount: value.discount,
            archived: value.archived,
        }
    }
}

fn short_description(text: &str) -> String {
    if text.chars().count() <= SHORT_DESCRIPTION_CHARS {
        return text.to_owned();
    }
    let head: String = text.chars().take(SHORT_DESCRIPTION_CHARS).collect();
    format!("{head}...")
}

pub async fn changelist(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ChangelistQuery>,
) -> Result<Json<Vec<ProductChangelistRow>>, AppError> {
    require_staff(&actor, CHANGELIST)?;
    let found = products::changelist(state.db.as_ref(), query.q.as_deref()).await?;
    Ok(Json(found.iter().map(ProductChangelistRow::from).collect()))
}

/// Creates one product per row of `csv_file`, owned by the importing user.
pub async fn import_products_csv(
    State(state): State<AppState>,
    actor: Actor,
    multipart: Multipart,
) -> Result<Response, AppError> {
    require_staff(&actor, "/admin/shop/product/import-products-csv/")?;
    let creator = actor.require_login(CHANGELIST)?;

    let form = MultipartForm::read(multipart).await?;
    let file = form.require_file("csv_file")?;
    let text = csv_exchange::decode(&file.data, file.charset())?;
    let rows: Vec<ProductRow> = csv_exchange::read_records(&text)?;
    products::import_rows(state.db.as_ref(), creator, rows).await?;

    Ok(found(CHANGELIST))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    ids: Option<String>,
}

fn parse_ids(raw: &str) -> Result<Vec<i32>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| AppError::BadRequest(format!("'{id}' is not a product id")))
        })
        .collect()
}

/// Every column of the selected products (all products without `ids`).
pub async fn export_csv(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    require_staff(&actor, "/admin/shop/product/export-csv/")?;

    let ids = query.ids.as_deref().map(parse_ids).transpose()?;
    let found = products::by_ids(state.db.as_ref(), ids.as_deref()).await?;
    let body = csv_exchange::write_table(
        PRODUCT_ALL_FIELDS,
        found.iter().map(csv_exchange::product_all_fields_row),
    )?;
    Ok(csv_attachment("products.csv", body))
}

#[derive(Debug, Deserialize)]
pub struct SelectedIds {
    ids: Vec<i32>,
}

pub async fn archive(
    State(state): State<AppState>,
    actor: Actor,
    Json(selected): Json<SelectedIds>,
) -> Result<Json<Value>, AppError> {
    require_staff(&actor, "/admin/shop/product/archive/")?;
    let updated = products::set_archived(state.db.as_ref(), &selected.ids, true).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn unarchive(
    State(state): State<AppState>,
    actor: Actor,
    Json(selected): Json<SelectedIds>,
) -> Result<Json<Value>, AppError> {
    require_staff(&actor, "/admin/shop/product/unarchive/")?;
    let updated = products::set_archived(state.db.as_ref(), &selected.ids, false).await?;
    Ok(Json(json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_descriptions_are_shortened() {
        assert_eq!(short_description("short"), "short");
        let long = "x".repeat(60);
        let short = short_description(&long);
        assert_eq!(short.len(), 53);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn ids_parse_from_comma_list() {
        assert_eq!(parse_ids("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_ids("1,x").is_err());
    }
}

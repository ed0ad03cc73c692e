use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::access::{can_change_product, Actor, Permission};
use crate::api::extract::{FormOrJson, MultipartForm};
use crate::api::{base_url, found, xml_response};
use crate::core::products;
use crate::error::AppError;
use crate::feeds::{self, Channel, FEED_SIZE};
use crate::forms::ProductForm;
use crate::serializers::{ProductDetail, ProductExportRow, ProductSerializer};
use crate::storage;
use crate::AppState;

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductSerializer>>, AppError> {
    let products = products::list_active(state.db.as_ref()).await?;
    Ok(Json(products.iter().map(ProductSerializer::from).collect()))
}

pub async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ProductDetail>, AppError> {
    let (product, images) = products::get_with_images(state.db.as_ref(), id).await?;
    Ok(Json(ProductDetail::new(&product, &images)))
}

pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    FormOrJson(form): FormOrJson<ProductForm>,
) -> Result<Response, AppError> {
    let path = "/shop/products/create/";
    let creator = actor.require_login(path)?;
    actor.require_perm(Permission::AddProduct, path)?;

    let fields = form.clean()?;
    products::create(state.db.as_ref(), creator, fields).await?;
    Ok(found("/shop/products/"))
}

pub async fn update_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    FormOrJson(form): FormOrJson<ProductForm>,
) -> Result<Response, AppError> {
    let product = products::get(state.db.as_ref(), id).await?;
    actor.require(
        can_change_product(&actor, &product),
        &format!("/shop/products/{id}/update/"),
    )?;

    let fields = form.clean()?;
    products::update(state.db.as_ref(), product, fields, None).await?;
    Ok(found(&format!("/shop/products/{id}/")))
}

/// Stores the `images` parts as product images and `preview` as the preview.
pub async fn upload_product_images(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let product = products::get(state.db.as_ref(), id).await?;
    actor.require(
        can_change_product(&actor, &product),
        &format!("/shop/products/{id}/images/"),
    )?;

    let form = MultipartForm::read(multipart).await?;
    let root = &state.config.media_root;
    let description = form.text("description").map(str::to_owned);

    let mut images = Vec::new();
    for image in form.files_named("images") {
        let relative = storage::product_image_path(id, &image.filename);
        match storage::save_unique(root, &relative, &image.data).await {
            Ok(stored) => images.push(stored),
            Err(err) => {
                storage::discard(root, &images).await;
                return Err(err);
            }
        }
    }
    let preview = match form.file("preview") {
        Some(preview) => {
            let relative = storage::product_preview_path(id, &preview.filename);
            match storage::save_unique(root, &relative, &preview.data).await {
                Ok(stored) => Some(stored),
                Err(err) => {
                    storage::discard(root, &images).await;
                    return Err(err);
                }
            }
        }
        None => None,
    };

    if let Err(err) =
        products::attach_media(state.db.as_ref(), product, &images, description, preview.clone())
            .await
    {
        images.extend(preview);
        storage::discard(root, &images).await;
        return Err(err);
    }

    Ok(found(&format!("/shop/products/{id}/")))
}

/// Archives instead of deleting; the product stays reachable by id.
pub async fn archive_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let product = products::get(state.db.as_ref(), id).await?;
    actor.require(
        can_change_product(&actor, &product),
        &format!("/shop/products/{id}/delete/"),
    )?;

    products::archive(state.db.as_ref(), product).await?;
    Ok(found("/shop/products/"))
}

pub async fn latest_products_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let base = base_url(&headers);
    let latest = products::latest(state.db.as_ref(), FEED_SIZE).await?;
    let items: Vec<_> = latest.iter().map(|p| feeds::product_item(&base, p)).collect();
    let channel = Channel {
        title: "Shop products (latest)",
        link: format!("{base}/shop/products/"),
        description: "Updates on changes and additions of shop products",
    };
    Ok(xml_response(
        "application/rss+xml; charset=utf-8",
        feeds::render_rss(&channel, &items)?,
    ))
}

/// Every product, archived included, by pk. Never cached.
pub async fn export_products(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let products = products::all_by_pk(state.db.as_ref()).await?;
    let rows: Vec<ProductExportRow> = products.iter().map(ProductExportRow::from).collect();
    info!(count = rows.len(), "Exported products");
    Ok(Json(json!({ "products": rows })))
}

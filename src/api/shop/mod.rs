pub mod orders;
pub mod products;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn shop_router() -> Router<AppState> {
    Router::new()
        .route("/shop/products/", get(products::list_products))
        .route("/shop/products/create/", post(products::create_product))
        .route("/shop/products/export/", get(products::export_products))
        .route("/shop/products/latest/feed/", get(products::latest_products_feed))
        .route("/shop/products/:id/", get(products::product_detail))
        .route("/shop/products/:id/update/", post(products::update_product))
        .route("/shop/products/:id/images/", post(products::upload_product_images))
        .route("/shop/products/:id/delete/", post(products::archive_product))
        .route("/shop/orders/", get(orders::list_orders))
        .route("/shop/orders/create/", post(orders::create_order))
        .route("/shop/orders/export/", get(orders::export_orders))
        .route("/shop/orders/:id/", get(orders::order_detail))
        .route("/shop/orders/:id/update/", post(orders::update_order))
        .route("/shop/orders/:id/delete/", post(orders::delete_order))
        .route("/shop/orders/:id/receipt/", post(orders::upload_receipt))
        .route("/shop/users/:user_id/orders/", get(orders::user_orders))
        .route("/shop/users/:user_id/orders/export/", get(orders::export_user_orders))
}

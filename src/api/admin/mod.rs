//! Staff-only admin operations under `/admin/`.

pub mod blog;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};

use crate::access::{is_admin, Actor};
use crate::error::AppError;
use crate::AppState;

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/shop/product/", get(products::changelist))
        .route(
            "/admin/shop/product/import-products-csv/",
            post(products::import_products_csv),
        )
        .route("/admin/shop/product/export-csv/", get(products::export_csv))
        .route("/admin/shop/product/archive/", post(products::archive))
        .route("/admin/shop/product/unarchive/", post(products::unarchive))
        .route("/admin/shop/order/", get(orders::changelist))
        .route(
            "/admin/shop/order/import-orders-csv/",
            post(orders::import_orders_csv),
        )
        .route("/admin/auth/user/:id/delete/", post(users::delete_user))
        .route("/admin/auth/user/:id/permissions/", get(users::permissions))
        .route(
            "/admin/auth/user/:id/permissions/grant/",
            post(users::grant_permission),
        )
        .route(
            "/admin/auth/user/:id/permissions/revoke/",
            post(users::revoke_permission),
        )
        .route("/admin/blog/article/", get(blog::changelist))
        .route("/admin/blog/article/add/", post(blog::add_article))
        .route("/admin/blog/article/:id/change/", post(blog::change_article))
        .route("/admin/blog/article/:id/delete/", post(blog::delete_article))
        .route("/admin/blog/author/add/", post(blog::add_author))
        .route("/admin/blog/author/:id/delete/", post(blog::delete_author))
        .route("/admin/blog/category/add/", post(blog::add_category))
        .route("/admin/blog/category/:id/delete/", post(blog::delete_category))
        .route("/admin/blog/tag/add/", post(blog::add_tag))
}

pub fn require_staff(actor: &Actor, path: &str) -> Result<(), AppError> {
    actor.require(is_admin(actor), path)
}

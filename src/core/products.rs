//! Product catalog operations.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Order},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use tracing::info;

use super::{SortKey, Window};
use crate::csv_exchange::ProductRow;
use crate::entities::product_image;
use crate::entities::product::{self, Entity as Product};
use crate::error::AppError;
use crate::forms::ProductFields;

/// Fields the REST list may be ordered by.
pub const ORDERING_FIELDS: &[&str] = &["name", "price", "discount"];

/// Exact-match and search filters of the REST product list.
#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount: Option<i32>,
    pub archived: Option<bool>,
}

fn default_order(select: Select<Product>) -> Select<Product> {
    select
        .order_by_asc(product::Column::Name)
        .order_by_asc(product::Column::Price)
}

/// The catalog: every non-archived product by (name, price).
pub async fn list_active<C: ConnectionTrait>(db: &C) -> Result<Vec<product::Model>, AppError> {
    let products = default_order(Product::find().filter(product::Column::Archived.eq(false)))
        .all(db)
        .await?;
    Ok(products)
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i32) -> Result<product::Model, AppError> {
    Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("product", id))
}

/// A product with its images. Archived products stay reachable here.
pub async fn get_with_images<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<(product::Model, Vec<product_image::Model>), AppError> {
    let found = get(db, id).await?;
    let images = found
        .find_related(product_image::Entity)
        .order_by_asc(product_image::Column::Id)
        .all(db)
        .await?;
    Ok((found, images))
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    created_by: i32,
    fields: ProductFields,
) -> Result<product::Model, AppError> {
    let new_product = product::ActiveModel {
        name: Set(fields.name),
        description: Set(fields.description),
        price: Set(fields.price),
        discount: Set(fields.discount),
        created_at: Set(Utc::now()),
        archived: Set(false),
        created_by: Set(created_by),
        preview: Set(None),
        ..Default::default()
    };
    let saved = new_product.insert(db).await?;
    info!(product_id = saved.id, created_by, "Product created");
    Ok(saved)
}

/// Overwrites the editable fields. `created_by` never changes.
pub async fn update<C: ConnectionTrait>(
    db: &C,
    found: product::Model,
    fields: ProductFields,
    archived: Option<bool>,
) -> Result<product::Model, AppError> {
    let mut active: product::ActiveModel = found.into();
    active.name = Set(fields.name);
    active.description = Set(fields.description);
    active.price = Set(fields.price);
    active.discount = Set(fields.discount);
    if let Some(archived) = archived {
        active.archived = Set(archived);
    }
    Ok(active.update(db).await?)
}

/// Soft delete: the row stays and remains fetchable by id.
pub async fn archive<C: ConnectionTrait>(
    db: &C,
    found: product::Model,
) -> Result<product::Model, AppError> {
    let id = found.id;
    let mut active: product::ActiveModel = found.into();
    active.archived = Set(true);
    let archived = active.update(db).await?;
    info!(product_id = id, "Product archived");
    Ok(archived)
}

/// Bulk archive/unarchive; returns the number of rows touched.
pub async fn set_archived<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
    archived: bool,
) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Product::update_many()
        .col_expr(product::Column::Archived, Expr::value(archived))
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn set_preview<C: ConnectionTrait>(
    db: &C,
    found: product::Model,
    path: String,
) -> Result<product::Model, AppError> {
    let mut active: product::ActiveModel = found.into();
    active.preview = Set(Some(path));
    Ok(active.update(db).await?)
}

pub async fn add_image<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
    path: String,
    description: Option<String>,
) -> Result<product_image::Model, AppError> {
    let image = product_image::ActiveModel {
        product_id: Set(product_id),
        image: Set(path),
        description: Set(description),
        ..Default::default()
    };
    Ok(image.insert(db).await?)
}

/// Records stored image files, and the preview when one was sent, together.
pub async fn attach_media(
    db: &DatabaseConnection,
    found: product::Model,
    images: &[String],
    description: Option<String>,
    preview: Option<String>,
) -> Result<(), AppError> {
    let txn = db.begin().await?;
    for path in images {
        add_image(&txn, found.id, path.clone(), description.clone()).await?;
    }
    if let Some(path) = preview {
        set_preview(&txn, found, path).await?;
    }
    txn.commit().await?;
    Ok(())
}

/// Newest non-archived products first.
pub async fn latest<C: ConnectionTrait>(
    db: &C,
    count: u64,
) -> Result<Vec<product::Model>, AppError> {
    let products = Product::find()
        .filter(product::Column::Archived.eq(false))
        .order_by_desc(product::Column::CreatedAt)
        .order_by_desc(product::Column::Id)
        .limit(count)
        .all(db)
        .await?;
    Ok(products)
}

/// Every product (archived included) by primary key.
pub async fn all_by_pk<C: ConnectionTrait>(db: &C) -> Result<Vec<product::Model>, AppError> {
    Ok(Product::find()
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// The products named by `ids`, or all of them when `ids` is `None`.
pub async fn by_ids<C: ConnectionTrait>(
    db: &C,
    ids: Option<&[i32]>,
) -> Result<Vec<product::Model>, AppError> {
    let mut select = Product::find().order_by_asc(product::Column::Id);
    if let Some(ids) = ids {
        select = select.filter(product::Column::Id.is_in(ids.iter().copied()));
    }
    Ok(select.all(db).await?)
}

/// Admin changelist: `-name, pk`, optionally searched over name/description.
pub async fn changelist<C: ConnectionTrait>(
    db: &C,
    search: Option<&str>,
) -> Result<Vec<product::Model>, AppError> {
    let mut select = Product::find()
        .order_by_desc(product::Column::Name)
        .order_by_asc(product::Column::Id);
    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        select = select.filter(search_condition(term));
    }
    Ok(select.all(db).await?)
}

fn search_condition(term: &str) -> Condition {
    Condition::any()
        .add(product::Column::Name.contains(term))
        .add(product::Column::Description.contains(term))
}

/// Filtered, ordered and optionally windowed product list with its total count.
pub async fn filtered<C: ConnectionTrait>(
    db: &C,
    filter: &ProductFilter,
    ordering: &[SortKey],
    window: Window,
) -> Result<(u64, Vec<product::Model>), AppError> {
    let mut select = Product::find();

    if let Some(term) = filter.search.as_deref().filter(|term| !term.is_empty()) {
        select = select.filter(search_condition(term));
    }
    if let Some(name) = &filter.name {
        select = select.filter(product::Column::Name.eq(name.as_str()));
    }
    if let Some(description) = &filter.description {
        select = select.filter(product::Column::Description.eq(description.as_str()));
    }
    if let Some(price) = filter.price {
        select = select.filter(product::Column::Price.eq(price));
    }
    if let Some(discount) = filter.discount {
        select = select.filter(product::Column::Discount.eq(discount));
    }
    if let Some(archived) = filter.archived {
        select = select.filter(product::Column::Archived.eq(archived));
    }

    if ordering.is_empty() {
        select = default_order(select);
    } else {
        for key in ordering {
            let column = match key.field.as_str() {
                "name" => product::Column::Name,
                "price" => product::Column::Price,
                "discount" => product::Column::Discount,
                _ => continue,
            };
            let order = if key.descending { Order::Desc } else { Order::Asc };
            select = select.order_by(column, order);
        }
    }
    select = select.order_by_asc(product::Column::Id);

    let count = select.clone().count(db).await?;
    if let Some(limit) = window.limit {
        select = select.offset(window.offset).limit(limit);
    }
    Ok((count, select.all(db).await?))
}

/// Inserts every row or none of them.
pub async fn import_rows(
    db: &DatabaseConnection,
    created_by: i32,
    rows: Vec<ProductRow>,
) -> Result<Vec<product::Model>, AppError> {
    let txn = db.begin().await?;
    let mut created = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = ProductFields {
            name: row.name,
            description: row.description,
            price: row.price,
            discount: row.discount,
        };
        created.push(create(&txn, created_by, fields).await?);
    }
    txn.commit().await?;
    info!(count = created.len(), created_by, "Imported products");
    Ok(created)
}

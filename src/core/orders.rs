//! Orders and their product membership.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Order, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, LoaderTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use tracing::info;

use super::{SortKey, Window};
use crate::csv_exchange::{CsvError, OrderRow};
use crate::entities::order::{self, Entity as OrderEntity};
use crate::entities::{order_product, product, user};
use crate::error::AppError;
use crate::forms::OrderForm;
use crate::serializers::OrderExportRow;

/// Fields the REST list may be ordered by.
pub const ORDERING_FIELDS: &[&str] = &["user", "delivery_address"];

pub type OrderWithProducts = (order::Model, Vec<product::Model>);

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub delivery_address: Option<String>,
    pub promocode: Option<String>,
    pub product: Option<i32>,
}

/// Per-order product count and price total.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTotals {
    pub order_id: i32,
    pub products_count: usize,
    pub total: Decimal,
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i32) -> Result<order::Model, AppError> {
    OrderEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("order", id))
}

pub async fn products_of<C: ConnectionTrait>(
    db: &C,
    found: &order::Model,
) -> Result<Vec<product::Model>, AppError> {
    Ok(found
        .find_related(product::Entity)
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?)
}

/// Loads products for a batch of orders in one round trip.
async fn with_products<C: ConnectionTrait>(
    db: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderWithProducts>, AppError> {
    let products = orders
        .load_many_to_many(product::Entity, order_product::Entity, db)
        .await?;
    Ok(orders
        .into_iter()
        .zip(products)
        .map(|(found, mut products)| {
            products.sort_by_key(|p| p.id);
            (found, products)
        })
        .collect())
}

/// Every order with its owner and products, by pk.
pub async fn list_all<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<(order::Model, Option<user::Model>, Vec<product::Model>)>, AppError> {
    let orders = OrderEntity::find()
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?;
    let owners = orders.load_one(user::Entity, db).await?;
    let orders = with_products(db, orders).await?;
    Ok(orders
        .into_iter()
        .zip(owners)
        .map(|((found, products), owner)| (found, owner, products))
        .collect())
}

/// The orders one user placed, by pk.
pub async fn for_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<OrderWithProducts>, AppError> {
    let orders = OrderEntity::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?;
    with_products(db, orders).await
}

/// An order with its owner and products.
pub async fn detail<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<(order::Model, user::Model, Vec<product::Model>), AppError> {
    let found = get(db, id).await?;
    let owner = found
        .find_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal(format!("order {id} has no owner")))?;
    let products = products_of(db, &found).await?;
    Ok((found, owner, products))
}

pub async fn filtered<C: ConnectionTrait>(
    db: &C,
    filter: &OrderFilter,
    ordering: &[SortKey],
    window: Window,
) -> Result<(u64, Vec<OrderWithProducts>), AppError> {
    let mut select = OrderEntity::find();

    if let Some(address) = &filter.delivery_address {
        select = select.filter(order::Column::DeliveryAddress.eq(address.as_str()));
    }
    if let Some(promocode) = &filter.promocode {
        select = select.filter(order::Column::Promocode.eq(promocode.as_str()));
    }
    if let Some(product_id) = filter.product {
        let members: Vec<i32> = order_product::Entity::find()
            .filter(order_product::Column::ProductId.eq(product_id))
            .all(db)
            .await?
            .into_iter()
            .map(|link| link.order_id)
            .collect();
        select = select.filter(order::Column::Id.is_in(members));
    }

    for key in ordering {
        let column = match key.field.as_str() {
            "user" => order::Column::UserId,
            "delivery_address" => order::Column::DeliveryAddress,
            _ => continue,
        };
        let direction = if key.descending { Order::Desc } else { Order::Asc };
        select = select.order_by(column, direction);
    }
    select = select.order_by_asc(order::Column::Id);

    let count = select.clone().count(db).await?;
    if let Some(limit) = window.limit {
        select = select.offset(window.offset).limit(limit);
    }
    let orders = select.all(db).await?;
    Ok((count, with_products(db, orders).await?))
}

/// Links `product_ids` to the order. Unknown ids fail the whole call;
/// already linked ids are skipped.
pub async fn attach_products<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
    product_ids: &[i32],
) -> Result<(), AppError> {
    if product_ids.is_empty() {
        return Ok(());
    }
    let wanted: HashSet<i32> = product_ids.iter().copied().collect();
    let known: HashSet<i32> = product::Entity::find()
        .filter(product::Column::Id.is_in(wanted.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();
    if let Some(missing) = product_ids.iter().find(|id| !known.contains(id)) {
        return Err(AppError::field(
            "products",
            format!("Select a valid choice. {missing} is not one of the available choices."),
        ));
    }

    let linked: HashSet<i32> = order_product::Entity::find()
        .filter(order_product::Column::OrderId.eq(order_id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.product_id)
        .collect();
    let links: Vec<order_product::ActiveModel> = wanted
        .difference(&linked)
        .map(|product_id| order_product::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(*product_id),
        })
        .collect();
    if links.is_empty() {
        return Ok(());
    }
    order_product::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn replace_products<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
    product_ids: &[i32],
) -> Result<(), AppError> {
    order_product::Entity::delete_many()
        .filter(order_product::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    attach_products(db, order_id, product_ids).await
}

async fn insert<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    delivery_address: Option<String>,
    promocode: String,
) -> Result<order::Model, AppError> {
    let new_order = order::ActiveModel {
        delivery_address: Set(delivery_address),
        promocode: Set(promocode),
        created_at: Set(Utc::now()),
        user_id: Set(user_id),
        receipt: Set(None),
        ..Default::default()
    };
    Ok(new_order.insert(db).await?)
}

/// Creates the order and its product links atomically.
pub async fn create(
    db: &DatabaseConnection,
    user_id: i32,
    form: OrderForm,
) -> Result<OrderWithProducts, AppError> {
    let txn = db.begin().await?;
    let created = insert(&txn, user_id, form.delivery_address, form.promocode).await?;
    attach_products(&txn, created.id, &form.products).await?;
    let products = products_of(&txn, &created).await?;
    txn.commit().await?;
    info!(order_id = created.id, user_id, "Order created");
    Ok((created, products))
}

/// Replaces the editable fields and the product set. The owner never changes.
pub async fn update(
    db: &DatabaseConnection,
    found: order::Model,
    form: OrderForm,
) -> Result<OrderWithProducts, AppError> {
    let txn = db.begin().await?;
    let id = found.id;
    let mut active: order::ActiveModel = found.into();
    active.delivery_address = Set(form.delivery_address);
    active.promocode = Set(form.promocode);
    let updated = active.update(&txn).await?;
    replace_products(&txn, id, &form.products).await?;
    let products = products_of(&txn, &updated).await?;
    txn.commit().await?;
    Ok((updated, products))
}

pub async fn set_receipt<C: ConnectionTrait>(
    db: &C,
    found: order::Model,
    path: String,
) -> Result<order::Model, AppError> {
    let mut active: order::ActiveModel = found.into();
    active.receipt = Set(Some(path));
    Ok(active.update(db).await?)
}

/// Hard delete, links first.
pub async fn delete(db: &DatabaseConnection, found: order::Model) -> Result<(), AppError> {
    let id = found.id;
    let txn = db.begin().await?;
    order_product::Entity::delete_many()
        .filter(order_product::Column::OrderId.eq(id))
        .exec(&txn)
        .await?;
    found.delete(&txn).await?;
    txn.commit().await?;
    info!(order_id = id, "Order deleted");
    Ok(())
}

pub async fn export_all<C: ConnectionTrait>(db: &C) -> Result<Vec<OrderExportRow>, AppError> {
    let orders = OrderEntity::find()
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?;
    Ok(with_products(db, orders)
        .await?
        .iter()
        .map(|(found, products)| OrderExportRow::new(found, products))
        .collect())
}

/// Inserts every row or none of them.
pub async fn import_rows(
    db: &DatabaseConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<OrderWithProducts>, AppError> {
    let txn = db.begin().await?;
    let mut created = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        if user::Entity::find_by_id(row.user).one(&txn).await?.is_none() {
            return Err(CsvError::InvalidValue {
                row: index + 1,
                field: "user",
                message: format!("no user with id {}", row.user),
            }
            .into());
        }
        let new_order = insert(&txn, row.user, row.delivery_address, row.promocode).await?;
        attach_products(&txn, new_order.id, &row.products)
            .await
            .map_err(|err| match err {
                AppError::Validation(_) => AppError::from(CsvError::InvalidValue {
                    row: index + 1,
                    field: "products",
                    message: "unknown product id".to_owned(),
                }),
                other => other,
            })?;
        let products = products_of(&txn, &new_order).await?;
        created.push((new_order, products));
    }
    txn.commit().await?;
    info!(count = created.len(), "Imported orders");
    Ok(created)
}

async fn all_product_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<i32>, AppError> {
    Ok(product::Entity::find()
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect())
}

/// Finds the user's order with this address and promocode or creates it,
/// then links every product. Returns the order, its products and whether
/// it was created.
pub async fn ensure_order_with_all_products(
    db: &DatabaseConnection,
    user_id: i32,
    delivery_address: &str,
    promocode: &str,
) -> Result<(OrderWithProducts, bool), AppError> {
    let txn = db.begin().await?;
    let existing = OrderEntity::find()
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::DeliveryAddress.eq(delivery_address))
        .filter(order::Column::Promocode.eq(promocode))
        .one(&txn)
        .await?;
    let (found, created) = match existing {
        Some(found) => (found, false),
        None => (
            insert(
                &txn,
                user_id,
                Some(delivery_address.to_owned()),
                promocode.to_owned(),
            )
            .await?,
            true,
        ),
    };
    attach_products(&txn, found.id, &all_product_ids(&txn).await?).await?;
    let products = products_of(&txn, &found).await?;
    txn.commit().await?;
    Ok(((found, products), created))
}

/// Links every product to the lowest-pk order, if there is one.
pub async fn attach_all_to_first(
    db: &DatabaseConnection,
) -> Result<Option<OrderWithProducts>, AppError> {
    let txn = db.begin().await?;
    let Some(first) = OrderEntity::find()
        .order_by_asc(order::Column::Id)
        .one(&txn)
        .await?
    else {
        return Ok(None);
    };
    attach_products(&txn, first.id, &all_product_ids(&txn).await?).await?;
    let products = products_of(&txn, &first).await?;
    txn.commit().await?;
    Ok(Some((first, products)))
}

/// Product count and summed price of every order, by pk.
pub async fn totals<C: ConnectionTrait>(db: &C) -> Result<Vec<OrderTotals>, AppError> {
    let orders = OrderEntity::find()
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?;
    Ok(with_products(db, orders)
        .await?
        .into_iter()
        .map(|(found, products)| OrderTotals {
            order_id: found.id,
            products_count: products.len(),
            total: products.iter().map(|p| p.price).sum(),
        })
        .collect())
}

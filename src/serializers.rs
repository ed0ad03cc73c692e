//! JSON shapes of the entities as the API hands them out.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{article, author, category, order, product, product_image, tag, user};
use crate::forms::format_price;

/// Public URL of a stored media file.
pub fn media_url(path: &str) -> String {
    format!("/media/{path}")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductSerializer {
    pub pk: i32,
    pub name: String,
    pub description: String,
    pub price: String,
    pub discount: i32,
    pub created_by: i32,
    pub archived: bool,
    pub preview: Option<String>,
}

impl From<&product::Model> for ProductSerializer {
    fn from(value: &product::Model) -> Self {
        ProductSerializer {
            pk: value.id,
            name: value.name.clone(),
            description: value.description.clone(),
            price: format_price(value.price),
            discount: value.discount,
            created_by: value.created_by,
            archived: value.archived,
            preview: value.preview.as_deref().map(media_url),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageSerializer {
    pub pk: i32,
    pub image: String,
    pub description: Option<String>,
}

impl From<&product_image::Model> for ImageSerializer {
    fn from(value: &product_image::Model) -> Self {
        ImageSerializer {
            pk: value.id,
            image: media_url(&value.image),
            description: value.description.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductSerializer,
    pub created_at: DateTime<Utc>,
    pub images: Vec<ImageSerializer>,
}

impl ProductDetail {
    pub fn new(product: &product::Model, images: &[product_image::Model]) -> Self {
        ProductDetail {
            product: product.into(),
            created_at: product.created_at,
            images: images.iter().map(ImageSerializer::from).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderSerializer {
    pub pk: i32,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub user: i32,
    pub products: Vec<i32>,
    pub receipt: Option<String>,
}

impl OrderSerializer {
    pub fn new(order: &order::Model, products: &[product::Model]) -> Self {
        OrderSerializer {
            pk: order.id,
            delivery_address: order.delivery_address.clone(),
            promocode: order.promocode.clone(),
            user: order.user_id,
            products: products.iter().map(|p| p.id).collect(),
            receipt: order.receipt.as_deref().map(media_url),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UserBrief {
    pub pk: i32,
    pub username: String,
}

impl From<&user::Model> for UserBrief {
    fn from(value: &user::Model) -> Self {
        UserBrief {
            pk: value.id,
            username: value.username.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    pub pk: i32,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub created_at: DateTime<Utc>,
    pub user: UserBrief,
    pub products: Vec<ProductSerializer>,
    pub receipt: Option<String>,
}

impl OrderDetail {
    pub fn new(order: &order::Model, owner: &user::Model, products: &[product::Model]) -> Self {
        OrderDetail {
            pk: order.id,
            delivery_address: order.delivery_address.clone(),
            promocode: order.promocode.clone(),
            created_at: order.created_at,
            user: owner.into(),
            products: products.iter().map(ProductSerializer::from).collect(),
            receipt: order.receipt.as_deref().map(media_url),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductExportRow {
    pub pk: i32,
    pub name: String,
    pub price: String,
    pub archived: bool,
}

impl From<&product::Model> for ProductExportRow {
    fn from(value: &product::Model) -> Self {
        ProductExportRow {
            pk: value.id,
            name: value.name.clone(),
            price: format_price(value.price),
            archived: value.archived,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderExportRow {
    pub pk: i32,
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub user: i32,
    pub products: Vec<i32>,
}

impl OrderExportRow {
    pub fn new(order: &order::Model, products: &[product::Model]) -> Self {
        OrderExportRow {
            pk: order.id,
            delivery_address: order.delivery_address.clone(),
            promocode: order.promocode.clone(),
            user: order.user_id,
            products: products.iter().map(|p| p.id).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ArticleListItem {
    pub pk: i32,
    pub title: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub author: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl ArticleListItem {
    pub fn new(
        article: &article::Model,
        author: Option<&author::Model>,
        category: Option<&category::Model>,
        tags: &[tag::Model],
    ) -> Self {
        ArticleListItem {
            pk: article.id,
            title: article.title.clone(),
            pub_date: article.pub_date,
            author: author.map(|a| a.name.clone()).unwrap_or_default(),
            category: category.map(|c| c.name.clone()).unwrap_or_default(),
            tags: tags.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ArticleDetail {
    pub pk: i32,
    pub title: String,
    pub content: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub author: author::Model,
    pub category: category::Model,
    pub tags: Vec<tag::Model>,
}

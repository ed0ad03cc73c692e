//! Header-driven CSV tables for bulk import and export.
//!
//! The first row names the fields; every following row is one entity. A
//! column the entity does not have, a missing required column or a value
//! that does not parse fails the whole table.

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::entities::{order, product};
use crate::forms::{format_price, parse_discount, parse_price};

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("malformed csv: {0}")]
    Malformed(#[from] csv::Error),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row}: {field}: {message}")]
    InvalidValue {
        row: usize,
        field: &'static str,
        message: String,
    },
    #[error("file is not valid {0} text")]
    Encoding(String),
    #[error("failed to write csv: {0}")]
    Write(String),
}

/// An entity that can be built from, and written as, one CSV row.
pub trait CsvRecord: Sized {
    /// Column order used for export; also the set of accepted columns.
    const FIELDS: &'static [&'static str];
    const REQUIRED: &'static [&'static str];

    fn from_row(row: usize, values: &HashMap<&str, &str>) -> Result<Self, CsvError>;

    fn to_row(&self) -> Vec<String>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductRow {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount: i32,
}

impl From<&product::Model> for ProductRow {
    fn from(value: &product::Model) -> Self {
        ProductRow {
            name: value.name.clone(),
            description: value.description.clone(),
            price: value.price,
            discount: value.discount,
        }
    }
}

impl CsvRecord for ProductRow {
    const FIELDS: &'static [&'static str] = &["name", "description", "price", "discount"];
    const REQUIRED: &'static [&'static str] = &["name", "price"];

    fn from_row(row: usize, values: &HashMap<&str, &str>) -> Result<Self, CsvError> {
        let name = values.get("name").copied().unwrap_or_default().trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(invalid(row, "name", "must hold 1 to 100 characters"));
        }
        let price = parse_price(values.get("price").copied().unwrap_or_default())
            .map_err(|msg| invalid(row, "price", msg))?;
        let discount = parse_discount(values.get("discount").copied().unwrap_or_default())
            .map_err(|msg| invalid(row, "discount", msg))?;

        Ok(ProductRow {
            name: name.to_owned(),
            description: values.get("description").copied().unwrap_or_default().to_owned(),
            price,
            discount,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone(),
            format_price(self.price),
            self.discount.to_string(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderRow {
    pub delivery_address: Option<String>,
    pub promocode: String,
    pub user: i32,
    /// Space-separated product ids in the file.
    pub products: Vec<i32>,
}

impl OrderRow {
    pub fn new(order: &order::Model, products: &[product::Model]) -> Self {
        OrderRow {
            delivery_address: order.delivery_address.clone(),
            promocode: order.promocode.clone(),
            user: order.user_id,
            products: products.iter().map(|p| p.id).collect(),
        }
    }
}

impl CsvRecord for OrderRow {
    const FIELDS: &'static [&'static str] = &["delivery_address", "promocode", "user", "products"];
    const REQUIRED: &'static [&'static str] = &["user"];

    fn from_row(row: usize, values: &HashMap<&str, &str>) -> Result<Self, CsvError> {
        let user = values
            .get("user")
            .copied()
            .unwrap_or_default()
            .trim()
            .parse::<i32>()
            .map_err(|_| invalid(row, "user", "must be a user id"))?;

        let promocode = values.get("promocode").copied().unwrap_or_default().trim();
        if promocode.chars().count() > 20 {
            return Err(invalid(row, "promocode", "must hold at most 20 characters"));
        }

        let mut products = values
            .get("products")
            .copied()
            .unwrap_or_default()
            .split_whitespace()
            .map(|id| id.parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid(row, "products", "must be space-separated product ids"))?;
        products.sort_unstable();
        products.dedup();

        let delivery_address = values
            .get("delivery_address")
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        Ok(OrderRow {
            delivery_address,
            promocode: promocode.to_owned(),
            user,
            products,
        })
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.delivery_address.clone().unwrap_or_default(),
            self.promocode.clone(),
            self.user.to_string(),
            self.products
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        ]
    }
}

fn invalid(row: usize, field: &'static str, message: impl Into<String>) -> CsvError {
    CsvError::InvalidValue {
        row,
        field,
        message: message.into(),
    }
}

/// Decodes an uploaded file using the charset the client declared.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<String, CsvError> {
    let charset = charset.unwrap_or("utf-8").trim().to_ascii_lowercase();
    match charset.as_str() {
        "utf-8" | "utf8" => {
            let text = std::str::from_utf8(bytes).map_err(|_| CsvError::Encoding(charset.clone()))?;
            Ok(text.trim_start_matches('\u{feff}').to_owned())
        }
        "latin-1" | "latin1" | "iso-8859-1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        other => Err(CsvError::Encoding(other.to_owned())),
    }
}

pub fn read_records<T: CsvRecord>(text: &str) -> Result<Vec<T>, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    for header in headers.iter() {
        if !T::FIELDS.contains(&header) {
            return Err(CsvError::UnknownColumn(header.to_owned()));
        }
    }
    for required in T::REQUIRED {
        if !headers.iter().any(|header| header == *required) {
            return Err(CsvError::MissingColumn(required));
        }
    }

    let mut items = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let values: HashMap<&str, &str> = headers.iter().zip(record.iter()).collect();
        items.push(T::from_row(index + 1, &values)?);
    }
    Ok(items)
}

pub fn write_records<T: CsvRecord>(records: &[T]) -> Result<Vec<u8>, CsvError> {
    write_table(T::FIELDS, records.iter().map(CsvRecord::to_row))
}

pub fn write_table<I>(header: &[&str], rows: I) -> Result<Vec<u8>, CsvError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|err| CsvError::Write(err.to_string()))
}

/// Every stored product column, for the admin export.
pub const PRODUCT_ALL_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "price",
    "discount",
    "created_at",
    "archived",
    "created_by",
    "preview",
];

pub fn product_all_fields_row(product: &product::Model) -> Vec<String> {
    vec![
        product.id.to_string(),
        product.name.clone(),
        product.description.clone(),
        format_price(product.price),
        product.discount.to_string(),
        product.created_at.to_rfc3339(),
        product.archived.to_string(),
        product.created_by.to_string(),
        product.preview.clone().unwrap_or_default(),
    ]
}

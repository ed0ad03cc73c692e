//! Input forms: what clients may submit, and the checks it must pass before
//! anything is written. A form that fails reports every bad field at once.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::access::Permission;
use crate::entities::{order, product};
use crate::error::{AppError, FieldErrors};

const PRICE_MAX_DIGITS: u32 = 8;
const PRICE_DECIMAL_PLACES: u32 = 2;
const DISCOUNT_MAX: i32 = i16::MAX as i32;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("static regex"));

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProductForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Enter a name of at most 100 characters."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_number")]
    #[validate(custom(function = validate_price))]
    pub price: String,
    #[serde(default, deserialize_with = "string_or_number")]
    #[validate(custom(function = validate_discount))]
    pub discount: String,
}

/// A product form that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount: i32,
}

impl ProductForm {
    pub fn from_model(model: &product::Model) -> ProductForm {
        ProductForm {
            name: model.name.clone(),
            description: model.description.clone(),
            price: format_price(model.price),
            discount: model.discount.to_string(),
        }
    }

    pub fn clean(mut self) -> Result<ProductFields, AppError> {
        self.name = self.name.trim().to_owned();
        self.validate()
            .map_err(|errors| AppError::Validation(field_errors(&errors)))?;

        let price = parse_price(&self.price).map_err(|msg| AppError::field("price", msg))?;
        let discount =
            parse_discount(&self.discount).map_err(|msg| AppError::field("discount", msg))?;

        Ok(ProductFields {
            name: self.name,
            description: self.description,
            price,
            discount,
        })
    }
}

/// Partial product update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub discount: Option<String>,
    pub archived: Option<bool>,
}

impl ProductPatch {
    pub fn apply(self, mut base: ProductForm) -> ProductForm {
        if let Some(name) = self.name {
            base.name = name;
        }
        if let Some(description) = self.description {
            base.description = description;
        }
        if let Some(price) = self.price {
            base.price = price;
        }
        if let Some(discount) = self.discount {
            base.discount = discount;
        }
        base
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct OrderForm {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub delivery_address: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "Ensure this value has at most 20 characters."))]
    pub promocode: String,
    #[serde(default)]
    pub products: Vec<i32>,
}

impl OrderForm {
    pub fn from_model(model: &order::Model, product_ids: Vec<i32>) -> OrderForm {
        OrderForm {
            delivery_address: model.delivery_address.clone(),
            promocode: model.promocode.clone(),
            products: product_ids,
        }
    }

    pub fn clean(mut self) -> Result<OrderForm, AppError> {
        self.validate()
            .map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        self.products.sort_unstable();
        self.products.dedup();
        Ok(self)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderPatch {
    #[serde(default, deserialize_with = "optional_blank_as_none")]
    pub delivery_address: Option<Option<String>>,
    pub promocode: Option<String>,
    pub products: Option<Vec<i32>>,
}

impl OrderPatch {
    pub fn apply(self, mut base: OrderForm) -> OrderForm {
        if let Some(address) = self.delivery_address {
            base.delivery_address = address;
        }
        if let Some(promocode) = self.promocode {
            base.promocode = promocode;
        }
        if let Some(products) = self.products {
            base.products = products;
        }
        base
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(regex(
        path = *USERNAME_REGEX,
        message = "Enter a valid username of letters, digits and @/./+/-/_ only."
    ))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    pub fn clean(self) -> Result<RegisterForm, AppError> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(errors) => field_errors(&errors),
        };
        if self.password1 != self.password2 {
            errors
                .entry("password2".to_owned())
                .or_default()
                .push("The two password fields didn't match.".to_owned());
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub bio: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub agreement_accepted: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ArticleForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Enter a title of at most 200 characters."))]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub author: Option<i32>,
    #[serde(default)]
    pub category: Option<i32>,
    #[serde(default)]
    pub tags: Vec<i32>,
}

/// An article form that passed validation; references are not yet checked.
#[derive(Clone, Debug, PartialEq)]
pub struct ArticleFields {
    pub title: String,
    pub content: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub author_id: i32,
    pub category_id: i32,
    pub tags: Vec<i32>,
}

impl ArticleForm {
    pub fn clean(mut self) -> Result<ArticleFields, AppError> {
        self.title = self.title.trim().to_owned();
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(errors) => field_errors(&errors),
        };

        let pub_date = match self.pub_date.as_deref().map(parse_datetime).transpose() {
            Ok(pub_date) => pub_date,
            Err(msg) => {
                push_error(&mut errors, "pub_date", msg);
                None
            }
        };
        if self.author.is_none() {
            push_error(&mut errors, "author", REQUIRED);
        }
        if self.category.is_none() {
            push_error(&mut errors, "category", REQUIRED);
        }

        match (self.author, self.category) {
            (Some(author_id), Some(category_id)) if errors.is_empty() => {
                self.tags.sort_unstable();
                self.tags.dedup();
                Ok(ArticleFields {
                    title: self.title,
                    content: self.content,
                    pub_date,
                    author_id,
                    category_id,
                    tags: self.tags,
                })
            }
            _ => Err(AppError::Validation(errors)),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct AuthorForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Enter a name of at most 100 characters."))]
    pub name: String,
    #[serde(default)]
    pub bio: String,
}

impl AuthorForm {
    pub fn clean(mut self) -> Result<AuthorForm, AppError> {
        self.name = self.name.trim().to_owned();
        self.validate()
            .map_err(|errors| AppError::Validation(field_errors(&errors)))?;
        Ok(self)
    }
}

/// A category or tag: just a name, with a per-kind length cap.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

impl NameForm {
    pub fn clean(self, max_chars: usize) -> Result<String, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::field("name", REQUIRED));
        }
        if name.chars().count() > max_chars {
            return Err(AppError::field(
                "name",
                format!("Ensure this value has at most {max_chars} characters."),
            ));
        }
        Ok(name.to_owned())
    }
}

/// Codename of a capability to grant or revoke.
#[derive(Clone, Debug, Deserialize)]
pub struct PermissionForm {
    #[serde(default)]
    pub codename: String,
}

impl PermissionForm {
    pub fn clean(self) -> Result<Permission, AppError> {
        Permission::from_codename(self.codename.trim()).ok_or_else(|| {
            AppError::field(
                "codename",
                format!("Select a valid choice. {} is not one of the available choices.", self.codename),
            )
        })
    }
}

const REQUIRED: &str = "This field is required.";

fn push_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_owned())
        .or_default()
        .push(message.to_owned());
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (UTC) or a bare date (midnight UTC).
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, &'static str> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| "Enter a valid date/time.")
}

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|err| {
                    err.message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| err.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Prices always render with exactly two decimal places.
pub fn format_price(price: Decimal) -> String {
    format!("{:.2}", price.round_dp(PRICE_DECIMAL_PLACES))
}

pub fn parse_price(raw: &str) -> Result<Decimal, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("This field is required.");
    }
    let price = Decimal::from_str(raw)
        .map_err(|_| "Enter a number.")?
        .normalize();
    if price.scale() > PRICE_DECIMAL_PLACES {
        return Err("Ensure that there are no more than 2 decimal places.");
    }
    let integer_digits = price.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    if integer_digits > PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES {
        return Err("Ensure that there are no more than 8 digits in total.");
    }
    Ok(price)
}

pub fn parse_discount(raw: &str) -> Result<i32, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    let discount: i32 = raw.parse().map_err(|_| "Enter a whole number.")?;
    if discount < 0 {
        return Err("Ensure this value is greater than or equal to 0.");
    }
    if discount > DISCOUNT_MAX {
        return Err("Ensure this value is less than or equal to 32767.");
    }
    Ok(discount)
}

fn validate_price(value: &str) -> Result<(), ValidationError> {
    parse_price(value)
        .map(|_| ())
        .map_err(|msg| ValidationError::new("invalid_price").with_message(msg.into()))
}

fn validate_discount(value: &str) -> Result<(), ValidationError> {
    parse_discount(value)
        .map(|_| ())
        .map_err(|msg| ValidationError::new("invalid_discount").with_message(msg.into()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(text) => text,
            Scalar::Integer(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Flag(value) => value.to_string(),
        }
    }
}

/// Accepts `"9.99"` as well as `9.99`, so JSON clients need not quote numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(Scalar::into_string)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<Scalar>::deserialize(deserializer).map(|value| value.map(Scalar::into_string))
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

/// Distinguishes "field absent" (outer `None`) from "explicitly cleared".
fn optional_blank_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<String>>, D::Error> {
    blank_as_none(deserializer).map(Some)
}

fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Scalar::deserialize(deserializer)?;
    Ok(match value {
        Scalar::Flag(flag) => flag,
        Scalar::Integer(value) => value != 0,
        Scalar::Float(value) => value != 0.0,
        Scalar::Text(text) => matches!(text.as_str(), "on" | "true" | "1" | "yes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_form(price: &str) -> ProductForm {
        ProductForm {
            name: "Widget".to_owned(),
            description: "x".to_owned(),
            price: price.to_owned(),
            discount: "0".to_owned(),
        }
    }

    #[test]
    fn valid_product_form_cleans() {
        let fields = product_form("9.99").clean().unwrap();
        assert_eq!(fields.price, Decimal::new(999, 2));
        assert_eq!(fields.discount, 0);
    }

    #[test]
    fn whitespace_name_counts_as_blank() {
        let form = ProductForm {
            name: "   ".to_owned(),
            ..product_form("1")
        };
        match form.clean() {
            Err(AppError::Validation(errors)) => assert!(errors.contains_key("name")),
            other => panic!("expected validation error, got {other:?}"),
        }
        let padded = ProductForm {
            name: "  Lamp ".to_owned(),
            ..product_form("1")
        };
        assert_eq!(padded.clean().unwrap().name, "Lamp");
    }

    #[test]
    fn article_form_reports_missing_references() {
        let form: ArticleForm =
            serde_json::from_value(json!({"title": "  ", "pub_date": "someday"})).unwrap();
        match form.clean() {
            Err(AppError::Validation(errors)) => {
                for field in ["title", "pub_date", "author", "category"] {
                    assert!(errors.contains_key(field), "{field} not reported");
                }
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn article_form_cleans() {
        let form: ArticleForm = serde_json::from_value(json!({
            "title": " Cats ",
            "pub_date": "2022-10-01",
            "author": 2,
            "category": 1,
            "tags": [3, 1, 3],
        }))
        .unwrap();
        let fields = form.clean().unwrap();
        assert_eq!(fields.title, "Cats");
        assert_eq!(fields.tags, vec![1, 3]);
        assert_eq!(
            fields.pub_date,
            Some(NaiveDate::from_ymd_opt(2022, 10, 1).unwrap().and_time(NaiveTime::MIN).and_utc())
        );
    }

    #[test]
    fn datetimes_in_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_datetime("2023-06-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_datetime("2023-06-01T14:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_datetime("2023-06-01 12:30").unwrap(), expected);
        assert!(parse_datetime("June first").is_err());
    }

    #[test]
    fn name_form_caps_length() {
        let tag = NameForm { name: " cats ".to_owned() };
        assert_eq!(tag.clean(20).unwrap(), "cats");
        let long = NameForm { name: "x".repeat(21) };
        assert!(long.clean(20).is_err());
        assert!(NameForm::default().clean(20).is_err());
    }

    #[test]
    fn permission_form_knows_codenames() {
        let form = PermissionForm { codename: "shopapp.add_product".to_owned() };
        assert_eq!(form.clean().unwrap(), Permission::AddProduct);
        let unknown = PermissionForm { codename: "shopapp.fly".to_owned() };
        assert!(unknown.clean().is_err());
    }

    #[test]
    fn non_numeric_price_is_a_field_error() {
        match product_form("cheap").clean() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors["price"], vec!["Enter a number.".to_owned()]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn every_bad_field_is_reported() {
        let form = ProductForm {
            name: String::new(),
            description: String::new(),
            price: "1.234".to_owned(),
            discount: "-1".to_owned(),
        };
        match form.clean() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.contains_key("name"));
                assert!(errors.contains_key("price"));
                assert!(errors.contains_key("discount"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn price_digit_limits() {
        assert!(parse_price("999999.99").is_ok());
        assert!(parse_price("1000000").is_err());
        assert_eq!(parse_price("123").unwrap(), Decimal::new(123, 0));
        assert_eq!(parse_price("1.50").unwrap(), Decimal::new(15, 1));
    }

    #[test]
    fn price_renders_two_places() {
        assert_eq!(format_price(Decimal::new(123, 0)), "123.00");
        assert_eq!(format_price(Decimal::new(999, 2)), "9.99");
    }

    #[test]
    fn json_numbers_are_accepted() {
        let form: ProductForm =
            serde_json::from_value(json!({"name": "A", "price": 9.5, "discount": 3})).unwrap();
        assert_eq!(form.price, "9.5");
        assert_eq!(form.discount, "3");
    }

    #[test]
    fn patch_overlays_only_given_fields() {
        let patch: ProductPatch = serde_json::from_value(json!({"price": "5"})).unwrap();
        let form = patch.apply(product_form("9.99"));
        assert_eq!(form.price, "5");
        assert_eq!(form.name, "Widget");
    }

    #[test]
    fn order_form_deduplicates_products() {
        let form = OrderForm {
            delivery_address: None,
            promocode: "AAA".to_owned(),
            products: vec![3, 1, 3],
        };
        assert_eq!(form.clean().unwrap().products, vec![1, 3]);
    }

    #[test]
    fn long_promocode_is_rejected() {
        let form = OrderForm {
            promocode: "X".repeat(21),
            ..OrderForm::default()
        };
        assert!(matches!(form.clean(), Err(AppError::Validation(_))));
    }

    #[test]
    fn register_passwords_must_match() {
        let form = RegisterForm {
            username: "bob".to_owned(),
            password1: "longenough".to_owned(),
            password2: "different!".to_owned(),
        };
        match form.clean() {
            Err(AppError::Validation(errors)) => assert!(errors.contains_key("password2")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn checkbox_accepts_on() {
        let form: ProfileForm =
            serde_json::from_value(json!({"bio": "hi", "agreement_accepted": "on"})).unwrap();
        assert!(form.agreement_accepted);
    }
}

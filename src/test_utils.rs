//! Shared helpers for the in-crate unit tests.

use sea_orm::{Database, DatabaseConnection};

use crate::core::users::{self, UserFlags};
use crate::entities::{setup_schema, user};
use crate::error::AppError;
use crate::forms::{parse_price, ProductFields};

/// An in-memory SQLite database with every table created.
pub async fn setup_test_db() -> Result<DatabaseConnection, AppError> {
    let db = Database::connect("sqlite::memory:").await?;
    setup_schema(&db).await?;
    Ok(db)
}

/// A plain user whose password is `password123`.
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<user::Model, AppError> {
    let (created, _) = users::create_user(db, username, "password123", UserFlags::default()).await?;
    Ok(created)
}

pub fn fields(name: &str, price: &str) -> ProductFields {
    ProductFields {
        name: name.to_owned(),
        description: String::new(),
        price: parse_price(price).expect("valid test price"),
        discount: 0,
    }
}

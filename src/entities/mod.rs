pub mod article;
pub mod article_tag;
pub mod author;
pub mod category;
pub mod order;
pub mod order_product;
pub mod permission;
pub mod product;
pub mod product_image;
pub mod profile;
pub mod tag;
pub mod user;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema, Set,
};
use tracing::info;

use crate::config::AdminSeed;
use crate::error::AppError;
use crate::middleware::auth::hash_password;

/// Creates every table that does not exist yet, parents before children.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, permission::Entity).await?;
    create_table(db, profile::Entity).await?;
    create_table(db, product::Entity).await?;
    create_table(db, product_image::Entity).await?;
    create_table(db, order::Entity).await?;
    create_table(db, order_product::Entity).await?;
    create_table(db, author::Entity).await?;
    create_table(db, category::Entity).await?;
    create_table(db, tag::Entity).await?;
    create_table(db, article::Entity).await?;
    create_table(db, article_tag::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut statement = Schema::new(backend).create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Makes sure the configured superuser exists.
pub async fn seed_admin(db: &DatabaseConnection, seed: &AdminSeed) -> Result<(), AppError> {
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(seed.username.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let admin = user::ActiveModel {
        username: Set(seed.username.clone()),
        password: Set(hash_password(&seed.password)?),
        first_name: Set(String::new()),
        is_staff: Set(true),
        is_superuser: Set(true),
        ..Default::default()
    };
    let admin = user::Entity::insert(admin).exec(db).await?;

    let admin_profile = profile::ActiveModel {
        user_id: Set(admin.last_insert_id),
        bio: Set(String::new()),
        agreement_accepted: Set(false),
        avatar: Set(None),
        ..Default::default()
    };
    profile::Entity::insert(admin_profile).exec(db).await?;

    info!(username = %seed.username, "Seeded superuser");
    Ok(())
}

//! Accounts, permission grants and profiles.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::access::Permission;
use crate::entities::{order, permission, product, profile, user};
use crate::error::AppError;
use crate::forms::{ProfileForm, RegisterForm};
use crate::middleware::auth::{hash_password, AuthError};

/// Account flags for users created outside registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserFlags {
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))
}

pub async fn find_by_username<C: ConnectionTrait>(
    db: &C,
    username: &str,
) -> Result<Option<user::Model>, AppError> {
    Ok(user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?)
}

pub async fn list<C: ConnectionTrait>(db: &C) -> Result<Vec<user::Model>, AppError> {
    Ok(user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?)
}

/// Checks a username/password pair.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<user::Model, AppError> {
    let found = find_by_username(db, username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    found.check_hash(password)?;
    Ok(found)
}

/// Creates a user together with its empty profile.
pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    flags: UserFlags,
) -> Result<(user::Model, profile::Model), AppError> {
    let txn = db.begin().await?;
    if find_by_username(&txn, username).await?.is_some() {
        return Err(AppError::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let new_user = user::ActiveModel {
        username: Set(username.to_owned()),
        password: Set(hash_password(password)?),
        first_name: Set(String::new()),
        is_staff: Set(flags.is_staff),
        is_superuser: Set(flags.is_superuser),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let new_profile = profile::ActiveModel {
        user_id: Set(new_user.id),
        bio: Set(String::new()),
        agreement_accepted: Set(false),
        avatar: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(user_id = new_user.id, username, "User created");
    Ok((new_user, new_profile))
}

pub async fn register(
    db: &DatabaseConnection,
    form: RegisterForm,
) -> Result<(user::Model, profile::Model), AppError> {
    let form = form.clean()?;
    create_user(db, &form.username, &form.password1, UserFlags::default()).await
}

/// Grants `perm` to the user; granting twice is a no-op.
pub async fn grant<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    perm: Permission,
) -> Result<(), AppError> {
    let existing = permission::Entity::find_by_id((user_id, perm.codename().to_owned()))
        .one(db)
        .await?;
    if existing.is_none() {
        permission::ActiveModel {
            user_id: Set(user_id),
            codename: Set(perm.codename().to_owned()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Withdraws `perm`; revoking one the user lacks is a no-op.
pub async fn revoke<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    perm: Permission,
) -> Result<(), AppError> {
    permission::Entity::delete_by_id((user_id, perm.codename().to_owned()))
        .exec(db)
        .await?;
    Ok(())
}

/// Codenames granted directly to the user, sorted.
pub async fn permissions_of<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<String>, AppError> {
    get(db, user_id).await?;
    Ok(permission::Entity::find()
        .filter(permission::Column::UserId.eq(user_id))
        .order_by_asc(permission::Column::Codename)
        .all(db)
        .await?
        .into_iter()
        .map(|granted| granted.codename)
        .collect())
}

/// Refused while the user still owns products or orders.
pub async fn delete_user(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let found = get(db, id).await?;
    let products = found.find_related(product::Entity).count(db).await?;
    let orders = found.find_related(order::Entity).count(db).await?;
    if products > 0 || orders > 0 {
        return Err(AppError::Conflict(format!(
            "User {id} still owns {products} product(s) and {orders} order(s)."
        )));
    }

    let txn = db.begin().await?;
    permission::Entity::delete_many()
        .filter(permission::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    profile::Entity::delete_many()
        .filter(profile::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    found.delete(&txn).await?;
    txn.commit().await?;
    info!(user_id = id, "User deleted");
    Ok(())
}

pub async fn profile<C: ConnectionTrait>(db: &C, id: i32) -> Result<profile::Model, AppError> {
    profile::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("profile", id))
}

pub async fn profile_of<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<profile::Model, AppError> {
    profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} has no profile.")))
}

pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    found: profile::Model,
    form: ProfileForm,
) -> Result<profile::Model, AppError> {
    let mut active: profile::ActiveModel = found.into();
    active.bio = Set(form.bio);
    active.agreement_accepted = Set(form.agreement_accepted);
    Ok(active.update(db).await?)
}

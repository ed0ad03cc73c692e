//! Who is acting, and what they may do.
//!
//! Every authorization decision in the service is one of the pure predicates
//! below, taking the actor and the resource. Handlers only translate a `false`
//! into the right HTTP answer.

use std::collections::HashSet;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::entities::{order, product, profile, user};
use crate::error::AppError;

/// Named capability grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    AddProduct,
    ChangeProduct,
    ViewOrder,
    ChangeOrder,
    DeleteOrder,
    ViewProfile,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::AddProduct,
        Permission::ChangeProduct,
        Permission::ViewOrder,
        Permission::ChangeOrder,
        Permission::DeleteOrder,
        Permission::ViewProfile,
    ];

    pub fn codename(self) -> &'static str {
        match self {
            Permission::AddProduct => "shopapp.add_product",
            Permission::ChangeProduct => "shopapp.change_product",
            Permission::ViewOrder => "shopapp.view_order",
            Permission::ChangeOrder => "shopapp.change_order",
            Permission::DeleteOrder => "shopapp.delete_order",
            Permission::ViewProfile => "myauth.view_profile",
        }
    }

    pub fn from_codename(codename: &str) -> Option<Permission> {
        Permission::ALL
            .into_iter()
            .find(|perm| perm.codename() == codename)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActorUser {
    pub id: i32,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// The authenticated user behind a request, or nobody.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Actor {
    user: Option<ActorUser>,
    permissions: HashSet<String>,
}

impl Actor {
    pub fn anonymous() -> Actor {
        Actor::default()
    }

    pub fn user(model: &user::Model, codenames: impl IntoIterator<Item = String>) -> Actor {
        Actor {
            user: Some(ActorUser {
                id: model.id,
                username: model.username.clone(),
                is_staff: model.is_staff,
                is_superuser: model.is_superuser,
            }),
            permissions: codenames.into_iter().collect(),
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_staff)
    }

    pub fn is_superuser(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_superuser)
    }

    /// Superusers implicitly hold every permission.
    pub fn has_perm(&self, perm: Permission) -> bool {
        self.is_superuser() || self.permissions.contains(perm.codename())
    }

    fn owns(&self, owner_id: i32) -> bool {
        self.id() == Some(owner_id)
    }

    /// The id of a logged-in actor, or a login redirect back to `path`.
    pub fn require_login(&self, path: &str) -> Result<i32, AppError> {
        self.id()
            .ok_or_else(|| AppError::LoginRequired(path.to_owned()))
    }

    /// Login redirect for anonymous actors, 403 for the rest.
    pub fn require(&self, allowed: bool, path: &str) -> Result<(), AppError> {
        if allowed {
            Ok(())
        } else if self.is_authenticated() {
            Err(AppError::Forbidden)
        } else {
            Err(AppError::LoginRequired(path.to_owned()))
        }
    }

    pub fn require_perm(&self, perm: Permission, path: &str) -> Result<(), AppError> {
        self.require(self.has_perm(perm), path)
    }
}

pub fn can_change_product(actor: &Actor, product: &product::Model) -> bool {
    actor.is_superuser() || actor.owns(product.created_by) || actor.has_perm(Permission::ChangeProduct)
}

pub fn can_change_order(actor: &Actor, order: &order::Model) -> bool {
    actor.is_superuser() || actor.owns(order.user_id) || actor.has_perm(Permission::ChangeOrder)
}

pub fn can_delete_order(actor: &Actor, order: &order::Model) -> bool {
    actor.is_superuser() || actor.owns(order.user_id) || actor.has_perm(Permission::DeleteOrder)
}

pub fn can_edit_profile(actor: &Actor, profile: &profile::Model) -> bool {
    actor.is_superuser() || actor.owns(profile.user_id)
}

/// Admin site access; also gates imports that name arbitrary owners.
pub fn is_admin(actor: &Actor) -> bool {
    actor.is_staff() || actor.is_superuser()
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Actor>()
            .cloned()
            .unwrap_or_default())
    }
}

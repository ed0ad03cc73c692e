//! Server-side sessions keyed by the `sessionid` cookie.

use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use moka::sync::Cache;
use uuid::Uuid;

use crate::config::SESSION_IDLE;

pub const SESSION_COOKIE: &str = "sessionid";

type SessionData = HashMap<String, String>;

#[derive(Clone)]
pub struct SessionStore {
    inner: Cache<String, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().time_to_idle(SESSION_IDLE).build(),
        }
    }

    pub fn get(&self, jar: &CookieJar, key: &str) -> Option<String> {
        let id = jar.get(SESSION_COOKIE)?.value().to_owned();
        self.inner.get(&id)?.get(key).cloned()
    }

    /// Stores `key = value` in the caller's session, opening a new session
    /// when the jar has none (or an expired one). Returns the jar to send back.
    pub fn set(&self, jar: CookieJar, key: &str, value: &str) -> CookieJar {
        let known = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|id| self.inner.contains_key(id));

        let id = known.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let mut data = self.inner.get(&id).unwrap_or_default();
        data.insert(key.to_owned(), value.to_owned());
        self.inner.insert(id.clone(), data);

        jar.add(
            Cookie::build((SESSION_COOKIE, id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax),
        )
    }

    pub fn flush(&self, jar: CookieJar) -> CookieJar {
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            self.inner.invalidate(cookie.value());
        }
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

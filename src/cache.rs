//! Fixed-TTL key/value caches for rendered JSON.
//!
//! Entries expire on their own; nothing invalidates them on writes, so a
//! reader may see data up to one TTL old.

use std::time::Duration;

use moka::sync::Cache;
use serde_json::Value;

use crate::config::{LIST_CACHE_TTL, ORDER_EXPORT_TTL, USER_ORDER_EXPORT_TTL};

const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
pub struct TtlCache {
    inner: Cache<String, Value>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.insert(key.into(), value);
    }
}

/// Every cache the service keeps, one per expiry policy.
#[derive(Clone)]
pub struct Caches {
    /// REST list responses keyed by request URI.
    pub lists: TtlCache,
    /// The staff-only order export.
    pub order_export: TtlCache,
    /// Order exports per user.
    pub user_order_export: TtlCache,
}

impl Caches {
    pub fn new() -> Self {
        Self {
            lists: TtlCache::new(LIST_CACHE_TTL),
            order_export: TtlCache::new(ORDER_EXPORT_TTL),
            user_order_export: TtlCache::new(USER_ORDER_EXPORT_TTL),
        }
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new()
    }
}

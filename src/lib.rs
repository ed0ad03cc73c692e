pub mod access;
pub mod api;
pub mod cache;
pub mod commands;
pub mod config;
pub mod core;
pub mod csv_exchange;
pub mod entities;
pub mod error;
pub mod feeds;
pub mod forms;
pub mod middleware;
pub mod serializers;
pub mod session;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};
use tracing::info;

use crate::cache::Caches;
use crate::config::Config;
use crate::entities::{seed_admin, setup_schema};
use crate::error::AppError;
use crate::middleware::counters::RequestCounters;
use crate::middleware::throttle::VisitLog;
use crate::session::SessionStore;

/// Everything a handler may reach, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub caches: Caches,
    pub sessions: SessionStore,
    pub counters: Arc<RequestCounters>,
    pub visits: Arc<VisitLog>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        AppState {
            db: Arc::new(db),
            config: Arc::new(config),
            caches: Caches::new(),
            sessions: SessionStore::new(),
            counters: Arc::new(RequestCounters::default()),
            visits: Arc::new(VisitLog::default()),
        }
    }

    /// Connects, creates missing tables and seeds the configured superuser.
    pub async fn init(config: Config) -> Result<Self, AppError> {
        let db = Database::connect(&config.database_url).await?;
        setup_schema(&db).await?;
        if let Some(seed) = &config.admin {
            seed_admin(&db, seed).await?;
        }
        info!(database = %config.database_url, "Database ready");
        Ok(AppState::new(db, config))
    }
}

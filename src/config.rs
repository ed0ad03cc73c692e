//! Process configuration, read from the environment (and `.env` when present).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// REST list responses stay cached this long.
pub const LIST_CACHE_TTL: Duration = Duration::from_secs(60 * 2);
/// The staff order export snapshot.
pub const ORDER_EXPORT_TTL: Duration = Duration::from_secs(60 * 5);
/// Per-user order export snapshots.
pub const USER_ORDER_EXPORT_TTL: Duration = Duration::from_secs(60 * 3);
/// Largest file `/req/upload/` will store.
pub const UPLOAD_SIZE_LIMIT: usize = 10 * 1024 * 1024;
/// Request bodies above this are refused before any handler runs.
pub const REQUEST_BODY_LIMIT: usize = 4 * UPLOAD_SIZE_LIMIT;
pub const COOKIE_MAX_AGE_SECS: i64 = 60 * 60;
pub const SESSION_IDLE: Duration = Duration::from_secs(60 * 60 * 24 * 14);
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

const DEFAULT_DATABASE_URL: &str = "sqlite://shopsite.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MEDIA_ROOT: &str = "./media";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub secret: String,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Config::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the config from `var`, which looks a variable up by name.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());
        let secret = var("SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("SECRET"))?;

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_addr.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let media_root = var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT));

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            _ => None,
        };

        Ok(Config {
            database_url,
            secret,
            bind_addr,
            media_root,
            admin,
        })
    }
}

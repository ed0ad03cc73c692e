use std::net::{IpAddr, SocketAddr};
use std::time::Duration as StdDuration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;
use tracing::debug;

use crate::AppState;

const MAX_ADDRESSES: u64 = 100_000;
/// An address unseen this long is forgotten and counts as new again.
const VISIT_MEMORY: StdDuration = StdDuration::from_secs(60 * 60);

/// Remembers when each source address was last seen.
///
/// This only keeps the books: the elapsed time is computed and logged but
/// no request is ever delayed or refused.
pub struct VisitLog {
    last_visit: Cache<String, DateTime<Utc>>,
}

impl Default for VisitLog {
    fn default() -> Self {
        VisitLog::with_limits(MAX_ADDRESSES, VISIT_MEMORY)
    }
}

impl VisitLog {
    pub fn with_limits(max_addresses: u64, memory: StdDuration) -> Self {
        VisitLog {
            last_visit: Cache::builder()
                .max_capacity(max_addresses)
                .time_to_idle(memory)
                .build(),
        }
    }

    /// Records a visit at `now`, returning the time since the previous one
    /// (zero on a first visit).
    pub fn record(&self, address: &str, now: DateTime<Utc>) -> Duration {
        let previous = self.last_visit.get(address).unwrap_or(now);
        self.last_visit.insert(address.to_owned(), now);
        now - previous
    }

    pub fn last_visit(&self, address: &str) -> Option<DateTime<Utc>> {
        self.last_visit.get(address)
    }

    pub fn tracked(&self) -> u64 {
        self.last_visit.run_pending_tasks();
        self.last_visit.entry_count()
    }
}

pub async fn throttle_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let address = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .map(|ip: IpAddr| ip.to_string())
        .unwrap_or_else(|| "unknown".to_owned());

    let elapsed = state.visits.record(&address, Utc::now());
    debug!(address = %address, elapsed_secs = elapsed.num_seconds(), "Visit recorded");

    next.run(req).await
}

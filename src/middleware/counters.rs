use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Per-process request bookkeeping. Never reset, never persisted.
#[derive(Debug, Default)]
pub struct RequestCounters {
    requests: AtomicU64,
    responses: AtomicU64,
    exceptions: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CounterSnapshot {
    pub requests_count: u64,
    pub responses_count: u64,
    pub exceptions_count: u64,
}

impl RequestCounters {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the running total.
    pub fn record_exception(&self) -> u64 {
        self.exceptions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests_count: self.requests.load(Ordering::Relaxed),
            responses_count: self.responses.load(Ordering::Relaxed),
            exceptions_count: self.exceptions.load(Ordering::Relaxed),
        }
    }
}

/// Sits outside the panic catcher, so a handler panic arrives here as a 500.
pub async fn count_requests_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    state.counters.record_request();
    let response = next.run(req).await;
    state.counters.record_response();

    if response.status().is_server_error() {
        let total = state.counters.record_exception();
        warn!(total, "got {total} exceptions so far");
    }

    response
}

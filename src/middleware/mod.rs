pub mod auth;
pub mod counters;
pub mod logging;
pub mod throttle;
pub mod user_agent;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;
use crate::store::FormStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable record store. Postgres in production, in-memory for local runs and tests.
    pub store: Arc<dyn FormStore>,
    pub config: Config,
    /// Fixed-window request counters, keyed by client address.
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(store: Arc<dyn FormStore>, config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        ));
        AppState {
            store,
            config,
            rate_limiter,
        }
    }
}

//! Routers y estado con reloj manual para tests.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use confera_core::ManualClock;
use confera_server::cache::{CacheConfig, ResponseCache};
use confera_server::metrics::{RecordingSink, detached_handle};
use confera_server::middleware::RateLimitLayer;
use confera_server::ratelimit::{RateLimitConfig, RateLimiter};
use confera_server::{AppState, create_router_with_state};

use super::TestClient;

/// Everything a test needs to drive the full router.
pub struct Harness {
    pub client: TestClient,
    pub state: AppState,
    pub clock: ManualClock,
    pub sink: Arc<RecordingSink>,
}

/// Cache with etags, small limiter (`max_requests` per `window`).
pub fn harness(max_requests: u32, window: Duration) -> Harness {
    let cache_config = CacheConfig {
        default_ttl: Duration::from_secs(30),
        max_items: Some(100),
        use_etag: true,
        sweep_interval: None,
    };
    harness_with(cache_config, Some(RateLimitConfig::new(max_requests, window)))
}

/// Cache only, no admission control on the routes.
pub fn unlimited_harness(cache_config: CacheConfig) -> Harness {
    harness_with(cache_config, None)
}

pub fn harness_with(cache_config: CacheConfig, limit: Option<RateLimitConfig>) -> Harness {
    let clock = ManualClock::new();
    let cache = ResponseCache::with_clock(cache_config, clock.shared()).unwrap();
    let limiter = RateLimiter::with_clock(limit.clone().unwrap_or_default(), clock.shared()).unwrap();
    let state = AppState::new(Arc::new(cache), Arc::new(limiter));
    let sink = Arc::new(RecordingSink::new());

    let layer = limit.map(|_| {
        RateLimitLayer::new(Arc::clone(state.limiter())).with_sink(sink.clone())
    });

    let app: Router = create_router_with_state(state.clone(), detached_handle(), layer);

    Harness {
        client: TestClient::new(app),
        state,
        clock,
        sink,
    }
}

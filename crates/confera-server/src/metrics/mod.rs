//! Metrics module for Confera.

pub mod cache;
pub mod http;
pub mod rate_limit;
pub mod setup;
pub mod sink;

pub use cache::{CacheMetrics, EvictionReason, register_cache_metrics};
pub use http::{HTTP_REQUEST_DURATION, HTTP_REQUESTS, register_http_metrics};
pub use rate_limit::{
    RATE_LIMIT_REQUESTS, RATE_LIMIT_TOKENS_REMAINING, register_rate_limit_metrics,
};
pub use setup::{detached_handle, init_metrics};
pub use sink::{MetricsSink, NoopSink, PrometheusSink, RecordingSink, SharedSink};

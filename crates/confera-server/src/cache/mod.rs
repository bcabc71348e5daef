//! Response cache for the Confera adapter.
//!
//! This module provides an in-memory cache of upstream API responses,
//! grouped by namespace, with TTL-based expiration, a FIFO size bound,
//! optional etags and pattern-based invalidation.

pub mod invalidation;
pub mod keys;
pub mod response_cache;
pub mod sweeper;

// Re-exports
pub use keys::{CacheKey, request_key};
pub use response_cache::{CacheConfig, CacheError, Cached, ResponseCache};
pub use sweeper::{MIN_SWEEP_INTERVAL, SweeperHandle};

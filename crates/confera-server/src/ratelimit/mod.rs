//! Admission control.
//!
//! [`RateLimiter`] decides whether a caller may proceed right now. The HTTP
//! side of it (identity extraction, the 429 response, metrics) lives in
//! [`crate::middleware::rate_limit`].

pub mod limiter;
mod reclaimer;

pub use limiter::{Admission, DEFAULT_MESSAGE, RateLimitConfig, RateLimiter};

//! Periodic drop of idle buckets.
//!
//! Bucket keys come from request headers, so without this the bucket map
//! grows with every distinct identity ever seen.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::SweeperHandle;
use crate::cache::sweeper::run_periodic;
use crate::ratelimit::RateLimiter;

impl RateLimiter {
    /// Runs [`reclaim_idle`](Self::reclaim_idle) every `every` on the
    /// current tokio runtime until the handle is stopped or dropped.
    pub fn start_reclaimer(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        let limiter = Arc::downgrade(self);
        SweeperHandle::spawn(move |shutdown_rx| {
            run_periodic(limiter, every, shutdown_rx, "bucket reclaimer", |limiter| {
                limiter.reclaim_idle();
            })
        })
    }
}

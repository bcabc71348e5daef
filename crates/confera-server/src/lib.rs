//! Confera Server - request governance for the Confera conferencing adapter
//!
//! Two components sit between the adapter and the upstream provider API:
//! - [`cache`]: namespaced response cache with TTL, FIFO bound and etags
//! - [`ratelimit`]: per-identity token bucket admission control, exposed to
//!   HTTP through [`middleware::RateLimitLayer`]
//!
//! The binary wires both into an axum router with an admin surface for
//! inspecting and invalidating the cache.

pub mod cache;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod ratelimit;
pub mod server;
pub mod settings;
pub mod state;

pub use server::{create_router, create_router_with_state, run_server_with_state};
pub use state::{AppState, JsonCache};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Confera Core - shared primitives for the request governance layer
//!
//! This crate provides the pieces both the response cache and the admission
//! controller build on:
//! - [`clock`]: an injectable time source, so expiry and refill can be driven
//!   deterministically in tests
//! - [`etag`]: deterministic content tags over a canonical JSON form
//! - [`fingerprint`]: one-way short digests for logging caller identities
//! - [`error`]: the configuration error taxonomy

pub mod clock;
pub mod error;
pub mod etag;
pub mod fingerprint;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, system_clock};
pub use error::{ConfigError, EtagError, Result};
pub use etag::{ETag, canonical_json};
pub use fingerprint::Fingerprint;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

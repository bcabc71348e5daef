//! Application state.

use std::sync::Arc;

use confera_core::ConfigError;
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::ratelimit::RateLimiter;
use crate::settings::Settings;

/// Cache of upstream JSON responses.
pub type JsonCache = ResponseCache<Value>;

/// Application state shared across all handlers.
///
/// Both components are built once and passed in; nothing reaches them
/// through globals.
#[derive(Clone)]
pub struct AppState {
    cache: Arc<JsonCache>,
    limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates a new AppState from already built components.
    pub fn new(cache: Arc<JsonCache>, limiter: Arc<RateLimiter>) -> Self {
        Self { cache, limiter }
    }

    /// Builds both components from settings. Fails on invalid values.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let cache = JsonCache::new(settings.cache.cache_config())?;
        let limiter = RateLimiter::new(settings.rate_limit.limiter_config()?)?;

        Ok(Self::new(Arc::new(cache), Arc::new(limiter)))
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &Arc<JsonCache> {
        &self.cache
    }

    /// Returns the admission controller.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

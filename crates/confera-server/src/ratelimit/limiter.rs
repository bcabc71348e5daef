//! Continuous-refill token bucket, one bucket per caller identity.

use std::time::{Duration, Instant};

use confera_core::{ConfigError, Fingerprint, SharedClock, system_clock};
use dashmap::DashMap;
use tracing::debug;

/// Mensaje por defecto de la respuesta 429.
pub const DEFAULT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Configuracion del rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Capacidad del bucket (default: 100)
    pub max_requests: u32,
    /// Tiempo para rellenar un bucket vacio (default: 60 segundos)
    pub window: Duration,
    /// Mensaje humano de la respuesta 429
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl RateLimitConfig {
    /// Creates a config with the default message.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::invalid_max_requests(self.max_requests));
        }
        if self.window.is_zero() {
            return Err(ConfigError::invalid_window(self.window));
        }
        Ok(())
    }
}

/// Result of one admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub allowed: bool,
    /// Bucket capacity.
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Time until the bucket is full again.
    pub reset_after: Duration,
    /// Set on denial: time until one token is available.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-identity token bucket admission controller.
///
/// Each identity gets a bucket holding up to `max_requests` tokens that
/// refills continuously, reaching full capacity after `window` of
/// inactivity. An allowed call consumes one token. Running out is a normal
/// outcome reported as `false`, never an error.
///
/// Buckets live in a [`DashMap`]; the refill-and-take of one identity runs
/// under that key's shard lock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use confera_server::ratelimit::{RateLimitConfig, RateLimiter};
///
/// let limiter = RateLimiter::new(RateLimitConfig::new(1, Duration::from_secs(60))).unwrap();
/// assert!(limiter.try_acquire("u1"));
/// assert!(!limiter.try_acquire("u1"));
/// assert!(limiter.try_acquire("u2"));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    config: RateLimitConfig,
    capacity: f64,
    clock: SharedClock,
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, system_clock())
    }

    /// Creates a limiter on an injected clock.
    pub fn with_clock(config: RateLimitConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            buckets: DashMap::new(),
            capacity: f64::from(config.max_requests),
            config,
            clock,
        })
    }

    /// Takes one token for `identity` if one is available.
    pub fn try_acquire(&self, identity: &str) -> bool {
        self.check(identity).allowed
    }

    /// Same as [`try_acquire`](Self::try_acquire), reporting the bucket state
    /// after the decision.
    pub fn check(&self, identity: &str) -> Admission {
        let now = self.clock.now();

        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| {
                debug!(caller = %Fingerprint::of(identity), "Creating rate limit bucket");
                Bucket {
                    tokens: self.capacity,
                    last_refill: now,
                }
            });

        bucket.tokens = self.refilled(bucket.tokens, bucket.last_refill, now);
        bucket.last_refill = now;

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
        }
        let tokens = bucket.tokens;
        drop(bucket);

        Admission {
            allowed,
            limit: self.config.max_requests,
            remaining: tokens.floor() as u32,
            reset_after: self.time_to_refill(self.capacity - tokens),
            retry_after: (!allowed).then(|| self.time_to_refill(1.0 - tokens)),
        }
    }

    /// Token level of `identity` as of now, without consuming or storing
    /// anything. `None` for identities never seen.
    pub fn tokens(&self, identity: &str) -> Option<f64> {
        let now = self.clock.now();
        self.buckets
            .get(identity)
            .map(|bucket| self.refilled(bucket.tokens, bucket.last_refill, now))
    }

    /// Number of identities currently tracked.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drops buckets idle for at least a full window.
    ///
    /// Such a bucket has refilled completely, and a fresh bucket starts
    /// full, so dropping it changes no future decision.
    pub fn reclaim_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();

        let window = self.config.window;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < window);

        let reclaimed = before.saturating_sub(self.buckets.len());
        if reclaimed > 0 {
            debug!(count = reclaimed, "Reclaimed idle rate limit buckets");
        }
        reclaimed
    }

    /// Retorna la configuracion.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn refilled(&self, tokens: f64, last_refill: Instant, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(last_refill);
        // elapsed / window first: a full window gives exactly `capacity`
        let gained = elapsed.as_secs_f64() / self.config.window.as_secs_f64() * self.capacity;
        (tokens + gained).clamp(0.0, self.capacity)
    }

    fn time_to_refill(&self, missing_tokens: f64) -> Duration {
        if missing_tokens <= 0.0 {
            return Duration::ZERO;
        }
        let fraction = missing_tokens / self.capacity;
        Duration::from_secs_f64(self.config.window.as_secs_f64() * fraction)
    }
}

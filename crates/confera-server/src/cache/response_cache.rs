//! Namespaced response cache with TTL expiry and FIFO size bound.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::{Duration, Instant};

use confera_core::{ConfigError, ETag, EtagError, SharedClock, system_clock};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::keys::CacheKey;
use crate::metrics::{CacheMetrics, EvictionReason};

/// Error del sistema de cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid invalidation pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Configuracion del cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL por defecto (default: 5 minutos)
    pub default_ttl: Duration,
    /// Maximo numero de entries entre todos los namespaces (None = sin limite)
    pub max_items: Option<usize>,
    /// Calcular etags al insertar
    pub use_etag: bool,
    /// Intervalo del barrido en background (None = solo expiracion lazy)
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_items: Some(10_000),
            use_etag: false,
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::invalid_ttl(self.default_ttl));
        }
        if Instant::now().checked_add(self.default_ttl).is_none() {
            return Err(ConfigError::validation(
                "cache.default_ttl",
                "too large to compute an expiry from",
            ));
        }
        if self.max_items == Some(0) {
            return Err(ConfigError::InvalidMaxItems);
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::validation(
                "cache.sweep_interval",
                "must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// A value served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<V> {
    pub value: V,
    /// Present only when the cache was built with `use_etag`.
    pub etag: Option<ETag>,
}

struct Entry<V> {
    value: V,
    /// None when the TTL reaches past what `Instant` can hold: never expires.
    expires_at: Option<Instant>,
    etag: Option<ETag>,
    sequence: u64,
}

struct CacheState<V> {
    entries: HashMap<CacheKey, Entry<V>>,
    /// Insertion order, oldest first.
    order: BTreeMap<u64, CacheKey>,
    next_sequence: u64,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.sequence);
        Some(entry)
    }

    fn pop_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Cache de respuestas de la API upstream.
///
/// Entries live under a `(namespace, key)` pair. Each `set` replaces the pair
/// wholesale; expiry is checked on read; when `max_items` is set, the oldest
/// inserted entries are evicted first across every namespace. Reads never
/// change eviction order.
///
/// All state sits behind one mutex, so the size bound and the one entry per
/// pair rule hold under concurrent callers.
///
/// # Examples
///
/// ```
/// use confera_server::cache::{CacheConfig, ResponseCache};
/// use serde_json::json;
///
/// let cache = ResponseCache::new(CacheConfig::default()).unwrap();
/// cache.set("rooms", "/rooms", json!([{"name": "standup"}]));
///
/// let hit = cache.get("rooms", "/rooms").unwrap();
/// assert_eq!(hit.value[0]["name"], "standup");
/// ```
pub struct ResponseCache<V> {
    state: Mutex<CacheState<V>>,
    config: CacheConfig,
    clock: SharedClock,
    metrics: CacheMetrics,
    tagger: Option<Tagger<V>>,
}

type Tagger<V> = fn(&V) -> Result<ETag, EtagError>;

fn is_expired(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.is_some_and(|deadline| now >= deadline)
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("len", &self.state.lock().entries.len())
            .finish()
    }
}

impl<V: Serialize> ResponseCache<V> {
    /// Crea un nuevo cache con el reloj del sistema.
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, system_clock())
    }

    /// Crea un nuevo cache con un reloj inyectado.
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        let tagger = config.use_etag.then_some(ETag::of::<V> as Tagger<V>);
        Self::build(config, clock, tagger)
    }
}

impl<V> ResponseCache<V> {
    /// Cache for values that cannot be serialized, so never tagged.
    ///
    /// Fails when `config.use_etag` is set.
    pub fn untagged(config: CacheConfig) -> Result<Self, ConfigError> {
        Self::untagged_with_clock(config, system_clock())
    }

    /// [`untagged`](Self::untagged) with an injected clock.
    pub fn untagged_with_clock(
        config: CacheConfig,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        if config.use_etag {
            return Err(ConfigError::validation(
                "cache.use_etag",
                "values of this cache cannot be tagged",
            ));
        }
        Self::build(config, clock, None)
    }

    fn build(
        config: CacheConfig,
        clock: SharedClock,
        tagger: Option<Tagger<V>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            state: Mutex::new(CacheState::new()),
            config,
            clock,
            metrics: CacheMetrics::new(),
            tagger,
        })
    }

    /// Inserta un valor con el TTL por defecto.
    ///
    /// Returns the entry's etag when tagging is enabled.
    pub fn set(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: V,
    ) -> Option<ETag> {
        self.set_with_ttl(namespace, key, value, None)
    }

    /// Inserta un valor; `ttl` overrides the default for this entry only.
    pub fn set_with_ttl(
        &self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: V,
        ttl: Option<Duration>,
    ) -> Option<ETag> {
        let key = CacheKey::new(namespace, key);
        let etag = self.tagger.and_then(|tag_of| match tag_of(&value) {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!(key = %key, error = %e, "Storing entry without etag");
                None
            },
        });

        // None si el TTL no cabe en un Instant: la entry no expira
        let expires_at = self
            .clock
            .now()
            .checked_add(ttl.unwrap_or(self.config.default_ttl));
        let mut evicted = 0usize;

        let len = {
            let mut state = self.state.lock();

            if state.remove(&key).is_some() {
                self.metrics.record_eviction(EvictionReason::Replaced);
            }

            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.order.insert(sequence, key.clone());
            state.entries.insert(
                key,
                Entry {
                    value,
                    expires_at,
                    etag: etag.clone(),
                    sequence,
                },
            );

            if let Some(max_items) = self.config.max_items {
                while state.entries.len() > max_items {
                    match state.pop_oldest() {
                        Some(oldest) => {
                            debug!(key = %oldest, "Evicted oldest cache entry");
                            evicted += 1;
                        },
                        None => break,
                    }
                }
            }

            state.entries.len()
        };

        for _ in 0..evicted {
            self.metrics.record_eviction(EvictionReason::Capacity);
        }
        self.metrics.update_entry_count(len);

        etag
    }

    /// Removes every expired entry now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.remove_where(
            |_, expires_at| is_expired(expires_at, now),
            EvictionReason::Expired,
        );

        if removed > 0 {
            debug!(count = removed, "Swept expired cache entries");
        }
        removed
    }

    /// Retorna el numero de entries, incluyendo expiradas aun no descubiertas.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Namespaces currently holding at least one entry, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut namespaces: Vec<String> = state
            .entries
            .keys()
            .map(|key| key.namespace().to_string())
            .collect();
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }

    /// Retorna la configuracion.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Retorna las metricas para acceso externo.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Removes every entry for which `predicate(key, expires_at)` holds.
    pub(super) fn remove_where<P>(&self, mut predicate: P, reason: EvictionReason) -> usize
    where
        P: FnMut(&CacheKey, Option<Instant>) -> bool,
    {
        let (removed, len) = {
            let mut state = self.state.lock();
            let doomed: Vec<CacheKey> = state
                .entries
                .iter()
                .filter(|(key, entry)| predicate(key, entry.expires_at))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &doomed {
                state.remove(key);
            }
            (doomed.len(), state.entries.len())
        };

        for _ in 0..removed {
            self.metrics.record_eviction(reason);
        }
        self.metrics.update_entry_count(len);
        removed
    }

    /// Removes a single pair.
    pub(super) fn remove_key(&self, key: &CacheKey) -> bool {
        let (removed, len) = {
            let mut state = self.state.lock();
            let removed = state.remove(key).is_some();
            (removed, state.entries.len())
        };

        if removed {
            self.metrics.record_eviction(EvictionReason::Explicit);
            self.metrics.update_entry_count(len);
        }
        removed
    }

    /// Drops everything and returns the number of entries removed.
    pub(super) fn remove_all(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.len();
            state.entries.clear();
            state.order.clear();
            removed
        };

        for _ in 0..removed {
            self.metrics.record_eviction(EvictionReason::Explicit);
        }
        self.metrics.update_entry_count(0);
        removed
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Obtiene un valor del cache si existe y no expiro.
    ///
    /// An expired entry is dropped on the way out.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Cached<V>> {
        let key = CacheKey::new(namespace, key);
        let now = self.clock.now();

        let mut state = self.state.lock();
        let expires_at = state.entries.get(&key).map(|entry| entry.expires_at);

        match expires_at {
            None => {
                drop(state);
                self.metrics.record_miss();
                None
            },
            Some(expires_at) if is_expired(expires_at, now) => {
                state.remove(&key);
                let len = state.entries.len();
                drop(state);

                debug!(key = %key, "Cache entry expired");
                self.metrics.record_eviction(EvictionReason::Expired);
                self.metrics.record_miss();
                self.metrics.update_entry_count(len);
                None
            },
            Some(_) => {
                let hit = state.entries.get(&key).map(|entry| Cached {
                    value: entry.value.clone(),
                    etag: entry.etag.clone(),
                });
                drop(state);

                self.metrics.record_hit();
                hit
            },
        }
    }

    /// Obtiene un valor o lo inserta usando la funcion proporcionada.
    ///
    /// Only `Ok` results are cached; an `Err` is returned as is. Concurrent
    /// misses on the same pair may each run `fetch`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use confera_server::cache::{CacheConfig, ResponseCache};
    /// # use serde_json::{Value, json};
    /// # #[tokio::main]
    /// # async fn main() {
    /// let cache: ResponseCache<Value> = ResponseCache::new(CacheConfig::default()).unwrap();
    ///
    /// let rooms = cache
    ///     .get_or_try_insert_with("rooms", "/rooms", || async {
    ///         // Fetch upstream (solo en cache miss)
    ///         Ok::<_, std::io::Error>(json!({"data": []}))
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(rooms, json!({"data": []}));
    /// # }
    /// ```
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        namespace: &str,
        key: &str,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.get(namespace, key) {
            return Ok(cached.value);
        }

        let value = fetch().await?;
        self.set(namespace, key, value.clone());
        Ok(value)
    }
}

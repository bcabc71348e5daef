//! Cache metrics: exported through `metrics` and mirrored in local counters
//! so the admin surface can report them without scraping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};

pub const CACHE_HITS: &str = "confera_cache_hits_total";
pub const CACHE_MISSES: &str = "confera_cache_misses_total";
pub const CACHE_EVICTIONS: &str = "confera_cache_evictions_total";
pub const CACHE_ENTRIES: &str = "confera_cache_entries";

/// Registra las metricas de cache. Llamar una vez al inicio.
pub fn register_cache_metrics() {
    metrics::describe_counter!(CACHE_HITS, "Cache lookups that returned a live entry");
    metrics::describe_counter!(CACHE_MISSES, "Cache lookups that found nothing live");
    metrics::describe_counter!(CACHE_EVICTIONS, "Entries removed from the cache, by reason");
    metrics::describe_gauge!(CACHE_ENTRIES, "Entries currently held, expired ones included");
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Pushed out by the size bound.
    Capacity,
    /// Found expired on read or by the sweeper.
    Expired,
    /// Removed by an invalidation call.
    Explicit,
    /// Superseded by a new `set` on the same pair.
    Replaced,
}

impl EvictionReason {
    pub const ALL: [EvictionReason; 4] = [
        EvictionReason::Capacity,
        EvictionReason::Expired,
        EvictionReason::Explicit,
        EvictionReason::Replaced,
    ];

    /// Label value on `confera_cache_evictions_total`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Capacity => "capacity",
            EvictionReason::Expired => "ttl",
            EvictionReason::Explicit => "manual",
            EvictionReason::Replaced => "replaced",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: [AtomicU64; 4],
}

/// Hit/miss/eviction accounting for one cache. Clones share counters.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    counters: Arc<Counters>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        counter!(CACHE_HITS).increment(1);
    }

    pub fn record_miss(&self) {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!(CACHE_MISSES).increment(1);
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        self.counters.evictions[reason.slot()].fetch_add(1, Ordering::Relaxed);
        counter!(CACHE_EVICTIONS, "reason" => reason.as_str()).increment(1);
    }

    pub fn update_entry_count(&self, count: usize) {
        gauge!(CACHE_ENTRIES).set(count as f64);
    }

    pub fn hits(&self) -> u64 {
        self.counters.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.counters.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self, reason: EvictionReason) -> u64 {
        self.counters.evictions[reason.slot()].load(Ordering::Relaxed)
    }

    /// Fraction of lookups served from the cache; 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        match hits + self.misses() {
            0 => 0.0,
            total => hits as f64 / total as f64,
        }
    }
}

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::time::Duration;

use confera_server::cache::{CacheConfig, ResponseCache};
use confera_server::ratelimit::{RateLimitConfig, RateLimiter};
use serde_json::{Value, json};

/// Crea una respuesta de prueba con N rooms
fn create_test_response(num_rooms: usize) -> Value {
    let rooms: Vec<Value> = (0..num_rooms)
        .map(|i| {
            json!({
                "id": format!("room-{}", i),
                "name": format!("Room {}", i),
                "privacy": "private",
                "config": {"max_participants": 10, "enable_chat": true}
            })
        })
        .collect();
    json!({ "total_count": num_rooms, "data": rooms })
}

fn cache(use_etag: bool) -> ResponseCache<Value> {
    ResponseCache::new(CacheConfig {
        use_etag,
        ..CacheConfig::default()
    })
    .unwrap()
}

/// Benchmark: Cache get (hit)
fn bench_cache_get_hit(c: &mut Criterion) {
    let cache = cache(true);
    cache.set("rooms", "/rooms", create_test_response(100));

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| std::hint::black_box(cache.get("rooms", "/rooms")));
    });
}

/// Benchmark: Cache get (miss)
fn bench_cache_get_miss(c: &mut Criterion) {
    let cache = cache(true);

    c.bench_function("cache_get_miss", |b| {
        b.iter(|| std::hint::black_box(cache.get("rooms", "/nonexistent")));
    });
}

/// Benchmark: set con y sin etag segun tamano de la respuesta
fn bench_cache_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_set");

    for size in [10, 100, 1000] {
        let response = create_test_response(size);
        group.throughput(Throughput::Elements(size as u64));

        for use_etag in [false, true] {
            let cache = cache(use_etag);
            let id = BenchmarkId::new(if use_etag { "etag" } else { "plain" }, size);
            group.bench_with_input(id, &response, |b, response| {
                b.iter(|| cache.set("rooms", "/rooms", response.clone()));
            });
        }
    }

    group.finish();
}

/// Benchmark: inserts past capacity, each one evicts the oldest
fn bench_cache_eviction(c: &mut Criterion) {
    let cache = ResponseCache::new(CacheConfig {
        max_items: Some(1000),
        ..CacheConfig::default()
    })
    .unwrap();
    let mut i = 0u64;

    c.bench_function("cache_set_evicting", |b| {
        b.iter(|| {
            i += 1;
            cache.set("rooms", format!("/rooms/{}", i), json!(i));
        });
    });
}

/// Benchmark: admission check, single and many identities
fn bench_rate_limiter(c: &mut Criterion) {
    let limiter = RateLimiter::new(RateLimitConfig::new(u32::MAX, Duration::from_secs(1))).unwrap();
    let identities: Vec<String> = (0..1000).map(|i| format!("tenant-{}", i)).collect();
    let mut n = 0usize;

    c.bench_function("rate_limit_check_single", |b| {
        b.iter(|| std::hint::black_box(limiter.check("tenant-0")));
    });

    c.bench_function("rate_limit_check_many", |b| {
        b.iter(|| {
            n = (n + 1) % identities.len();
            std::hint::black_box(limiter.check(&identities[n]))
        });
    });
}

criterion_group!(
    benches,
    bench_cache_get_hit,
    bench_cache_get_miss,
    bench_cache_set,
    bench_cache_eviction,
    bench_rate_limiter
);
criterion_main!(benches);

//! Confera Server binary.

use std::sync::Arc;

use anyhow::Context;
use confera_server::metrics::{PrometheusSink, init_metrics};
use confera_server::middleware::RateLimitLayer;
use confera_server::settings::Settings;
use confera_server::{AppState, run_server_with_state};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("failed to load settings")?;
    let addr = settings.server.addr()?;

    tracing::info!(
        "Starting Confera Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let prometheus_handle = init_metrics().context("failed to install metrics recorder")?;

    let state = AppState::from_settings(&settings)?;

    tracing::info!(
        default_ttl_ms = settings.cache.default_ttl_ms,
        max_items = settings.cache.max_items,
        use_etag = settings.cache.use_etag,
        "Response cache ready"
    );

    // Barrido periodico de entries expiradas
    let sweeper = state
        .cache()
        .config()
        .sweep_interval
        .map(|every| state.cache().start_sweeper(every));

    // Buckets idle for a full window are dropped once per window
    let reclaimer = settings.rate_limit.enabled.then(|| {
        let window = state.limiter().config().window;
        state.limiter().start_reclaimer(window)
    });

    let rate_limit = if settings.rate_limit.enabled {
        tracing::info!(
            max_requests = settings.rate_limit.max_requests,
            window_ms = settings.rate_limit.window_ms,
            "Rate limiting enabled"
        );
        Some(
            RateLimitLayer::new(Arc::clone(state.limiter()))
                .with_extractor(Arc::new(settings.rate_limit.extractor()?))
                .with_sink(Arc::new(PrometheusSink))
                .annotate_headers(settings.rate_limit.annotate_headers),
        )
    } else {
        tracing::warn!("Rate limiting disabled");
        None
    };

    run_server_with_state(addr, state, prometheus_handle, rate_limit).await?;

    for task in sweeper.into_iter().chain(reclaimer) {
        task.join().await;
    }

    Ok(())
}

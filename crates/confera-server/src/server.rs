//! Router assembly and the serve loop.

use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;

use crate::handlers::{cache, health::health_check, metrics::metrics_handler};
use crate::metrics::http::http_metrics_middleware;
use crate::middleware::{LoggingLayer, RateLimitLayer, RequestIdLayer};
use crate::state::AppState;

/// Full admin router: `/health`, `/metrics` and the `/cache` routes.
///
/// `rate_limit` guards only the `/cache` routes.
pub fn create_router_with_state(
    state: AppState,
    prometheus_handle: PrometheusHandle,
    rate_limit: Option<RateLimitLayer>,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(cache_routes(state, rate_limit))
        .merge(metrics_router)
        .layer(middleware::from_fn(http_metrics_middleware));

    with_request_layers(app)
}

/// Health only, no state. Used by tests that only exercise the middleware.
pub fn create_router() -> Router {
    with_request_layers(Router::new().route("/health", get(health_check)))
}

fn cache_routes(state: AppState, rate_limit: Option<RateLimitLayer>) -> Router {
    let routes = Router::new()
        .route("/cache", get(cache::cache_stats).delete(cache::invalidate_all))
        .route(
            "/cache/{namespace}",
            get(cache::get_entry).delete(cache::invalidate_namespace),
        )
        .with_state(state);

    match rate_limit {
        Some(layer) => routes.layer(layer),
        None => routes,
    }
}

// Request id va afuera para que el logging lo vea
fn with_request_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(RequestIdLayer)
            .layer(LoggingLayer),
    )
}

/// Binds `addr` and serves until Ctrl+C or SIGTERM.
pub async fn run_server_with_state(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
    rate_limit: Option<RateLimitLayer>,
) -> Result<(), std::io::Error> {
    let app = create_router_with_state(state, prometheus_handle, rate_limit);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Admin surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

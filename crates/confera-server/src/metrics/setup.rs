//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::{register_cache_metrics, register_http_metrics, register_rate_limit_metrics};

/// Buckets para histogramas de latencia HTTP (en segundos).
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, // 500 microsegundos
    0.001,  // 1 milisegundo
    0.005,  // 5 milisegundos
    0.01,   // 10 milisegundos
    0.05,   // 50 milisegundos
    0.1,    // 100 milisegundos
    0.5,    // 500 milisegundos
    1.0,    // 1 segundo
    5.0,    // 5 segundos
];

/// Inicializa el sistema de metricas y retorna el handle para el endpoint.
///
/// Installs the global recorder, so it can only succeed once per process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()?;

    register_http_metrics();
    register_cache_metrics();
    register_rate_limit_metrics();

    info!("Metrics system initialized");
    Ok(handle)
}

/// Builds a handle without installing it globally. Used by tests.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

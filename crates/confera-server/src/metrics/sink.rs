//! Metrics sink handed to the admission middleware.
//!
//! The middleware only needs two verbs, increment a counter and set a gauge,
//! so it takes a trait object instead of talking to the global recorder.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::Label;
use parking_lot::Mutex;

/// Label pairs attached to a sample.
pub type Labels<'a> = &'a [(&'static str, &'a str)];

/// Destination for counters and gauges.
pub trait MetricsSink: Send + Sync {
    /// Adds one to a counter.
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>);

    /// Sets a gauge to `value`.
    fn set_gauge(&self, name: &'static str, labels: Labels<'_>, value: f64);
}

/// Sink shared between the middleware and whoever reads it.
pub type SharedSink = Arc<dyn MetricsSink>;

/// Forwards to the `metrics` facade (Prometheus exporter in the binary).
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSink;

impl PrometheusSink {
    fn labels(labels: Labels<'_>) -> Vec<Label> {
        labels
            .iter()
            .map(|(key, value)| Label::new(*key, value.to_string()))
            .collect()
    }
}

impl MetricsSink for PrometheusSink {
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>) {
        metrics::counter!(name, Self::labels(labels)).increment(1);
    }

    fn set_gauge(&self, name: &'static str, labels: Labels<'_>, value: f64) {
        metrics::gauge!(name, Self::labels(labels)).set(value);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment_counter(&self, _name: &'static str, _labels: Labels<'_>) {}

    fn set_gauge(&self, _name: &'static str, _labels: Labels<'_>, _value: f64) {}
}

/// Keeps samples in memory so they can be asserted on.
#[derive(Debug, Default)]
pub struct RecordingSink {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, f64>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero if never incremented.
    pub fn counter(&self, name: &str, labels: Labels<'_>) -> u64 {
        self.counters
            .lock()
            .get(&sample_key(name, labels))
            .copied()
            .unwrap_or(0)
    }

    /// Last value written to a gauge.
    pub fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        self.gauges.lock().get(&sample_key(name, labels)).copied()
    }
}

impl MetricsSink for RecordingSink {
    fn increment_counter(&self, name: &'static str, labels: Labels<'_>) {
        *self
            .counters
            .lock()
            .entry(sample_key(name, labels))
            .or_insert(0) += 1;
    }

    fn set_gauge(&self, name: &'static str, labels: Labels<'_>, value: f64) {
        self.gauges.lock().insert(sample_key(name, labels), value);
    }
}

/// `name{k1=v1,k2=v2}` with labels in the order given.
fn sample_key(name: &str, labels: Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered = labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",");
    format!("{}{{{}}}", name, rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts_per_label_set() {
        let sink = RecordingSink::new();

        sink.increment_counter("requests", &[("outcome", "allowed")]);
        sink.increment_counter("requests", &[("outcome", "allowed")]);
        sink.increment_counter("requests", &[("outcome", "denied")]);

        assert_eq!(sink.counter("requests", &[("outcome", "allowed")]), 2);
        assert_eq!(sink.counter("requests", &[("outcome", "denied")]), 1);
        assert_eq!(sink.counter("requests", &[]), 0);
    }

    #[test]
    fn test_recording_sink_keeps_last_gauge() {
        let sink = RecordingSink::new();

        sink.set_gauge("tokens", &[], 4.0);
        sink.set_gauge("tokens", &[], 3.0);

        assert_eq!(sink.gauge("tokens", &[]), Some(3.0));
        assert_eq!(sink.gauge("other", &[]), None);
    }

    #[test]
    fn test_prometheus_sink_without_recorder_is_silent() {
        let sink = PrometheusSink;
        sink.increment_counter("confera_test_total", &[("outcome", "allowed")]);
        sink.set_gauge("confera_test_gauge", &[], 1.0);
    }
}

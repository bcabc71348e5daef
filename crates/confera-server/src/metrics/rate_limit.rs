//! Admission control metric names.

/// Counter of admission checks, labelled `outcome = allowed | denied`.
pub const RATE_LIMIT_REQUESTS: &str = "confera_ratelimit_requests_total";

/// Gauge of whole tokens left in the bucket that was just checked.
pub const RATE_LIMIT_TOKENS_REMAINING: &str = "confera_ratelimit_tokens_remaining";

/// Registra las metricas de rate limiting.
pub fn register_rate_limit_metrics() {
    metrics::describe_counter!(
        RATE_LIMIT_REQUESTS,
        "Total number of admission checks by outcome"
    );
    metrics::describe_gauge!(
        RATE_LIMIT_TOKENS_REMAINING,
        "Tokens remaining in the most recently checked bucket"
    );
}

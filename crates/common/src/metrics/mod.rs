//! Metrics and observability utilities
//!
//! Prometheus metrics via the `metrics` facade, with a shared prefix
//! and label conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Provato metrics
pub const METRICS_PREFIX: &str = "provato";

/// Histogram buckets for request and graph latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for language-model latency (typically slower)
pub const COMPLETION_BUCKETS: &[f64] = &[0.100, 0.250, 0.500, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );
    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Graph queries by kind and outcome"
    );
    describe_histogram!(
        format!("{}_graph_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph query latency in seconds"
    );
    describe_counter!(
        format!("{}_graph_batches_total", METRICS_PREFIX),
        Unit::Count,
        "Write batches applied to the graph"
    );

    describe_counter!(
        format!("{}_retrieval_total", METRICS_PREFIX),
        Unit::Count,
        "Retrieval operations by mode"
    );
    describe_histogram!(
        format!("{}_retrieval_facts", METRICS_PREFIX),
        Unit::Count,
        "Facts produced per retrieval"
    );

    describe_counter!(
        format!("{}_completion_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Language-model calls by outcome"
    );
    describe_histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language-model call latency in seconds"
    );

    describe_counter!(
        format!("{}_loader_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Rows processed by bulk loaders"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a graph read
pub fn record_graph_query(kind: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_graph_queries_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_graph_query_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a write batch
pub fn record_graph_batch(size: usize, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_graph_batches_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);
    tracing::trace!(size, status, "Batch recorded");
}

/// Helper to record a retrieval operation
pub fn record_retrieval(mode: &str, fact_count: usize) {
    counter!(
        format!("{}_retrieval_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_retrieval_facts", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(fact_count as f64);
}

/// Helper to record a language-model call
pub fn record_completion(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "fallback" };

    counter!(
        format!("{}_completion_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record loader progress
pub fn record_loader_rows(entity: &str, loaded: usize, skipped: usize) {
    counter!(
        format!("{}_loader_rows_total", METRICS_PREFIX),
        "entity" => entity.to_string(),
        "outcome" => "loaded"
    )
    .increment(loaded as u64);

    if skipped > 0 {
        counter!(
            format!("{}_loader_rows_total", METRICS_PREFIX),
            "entity" => entity.to_string(),
            "outcome" => "skipped"
        )
        .increment(skipped as u64);
    }
}

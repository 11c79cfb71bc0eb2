//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all MedSearch metrics
pub const METRICS_PREFIX: &str = "medsearch";

/// Register all metric descriptions
pub fn register_metrics() {
    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search request latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of records returned from search"
    );

    describe_counter!(
        format!("{}_search_partial_total", METRICS_PREFIX),
        Unit::Count,
        "Total searches that returned partial results"
    );

    // Provider metrics
    describe_counter!(
        format!("{}_provider_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total provider adapter failures"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total query cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total query cache misses"
    );

    describe_counter!(
        format!("{}_cache_evictions_total", METRICS_PREFIX),
        Unit::Count,
        "Total query cache evictions"
    );

    // Chat metrics
    describe_counter!(
        format!("{}_chat_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Generation backend latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total generation backend errors"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, search_type: &str, result_count: usize, partial: bool) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "search_type" => search_type.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "search_type" => search_type.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "search_type" => search_type.to_string()
    )
    .set(result_count as f64);

    if partial {
        counter!(
            format!("{}_search_partial_total", METRICS_PREFIX),
            "search_type" => search_type.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a provider adapter failure
pub fn record_provider_error(source: &str) {
    counter!(
        format!("{}_provider_errors_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool) {
    if hit {
        counter!(format!("{}_cache_hits_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_cache_misses_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record a cache eviction
pub fn record_cache_eviction() {
    counter!(format!("{}_cache_evictions_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record generation backend metrics
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    counter!(
        format!("{}_chat_requests_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_generation_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

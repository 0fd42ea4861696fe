//! Prometheus metrics for the Runlet server.
//!
//! Exposes execution outcomes, handler cache efficiency, compile failures,
//! management mutations and invocation latency.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Labels never carry scopes or script names, but aggregate traffic is still
//! visible, so the endpoint MUST be network-restricted to authorized scraper
//! IPs at the infrastructure level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Execution metrics
pub static EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "runlet_executions_total",
            "Total number of script invocations by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static INVOCATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "runlet_invocation_duration_seconds",
            "Time spent running a tenant handler",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

// Handler cache metrics
pub static HANDLER_CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "runlet_handler_cache_hits_total",
        "Total number of invocations served by a cached handler",
    )
    .expect("metric creation failed")
});

pub static HANDLER_CACHE_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "runlet_handler_cache_misses_total",
        "Total number of invocations that had to fetch and compile",
    )
    .expect("metric creation failed")
});

pub static HANDLER_CACHE_ENTRIES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "runlet_handler_cache_entries",
        "Compiled handlers currently cached",
    )
    .expect("metric creation failed")
});

pub static COMPILE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "runlet_compile_failures_total",
        "Total number of scripts that failed to compile on the execute path",
    )
    .expect("metric creation failed")
});

// Management metrics
pub static SCRIPT_MUTATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "runlet_script_mutations_total",
            "Total number of successful script mutations by operation",
        ),
        &["operation"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(EXECUTIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(INVOCATION_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HANDLER_CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HANDLER_CACHE_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HANDLER_CACHE_ENTRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COMPILE_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SCRIPT_MUTATIONS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record the outcome of one invocation.
pub fn record_execution(outcome: &str) {
    EXECUTIONS.with_label_values(&[outcome]).inc();
}

/// Record a successful management mutation.
pub fn record_mutation(operation: &str) {
    SCRIPT_MUTATIONS.with_label_values(&[operation]).inc();
}

// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{describe_counter, describe_histogram, histogram, increment_counter, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{describe_counter, describe_histogram, histogram, increment_counter};

use std::time::Duration;

/// Initializes the descriptions for all the metrics in the SDK.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!("council_cache_hits_total", "Reads served from the query cache or joined in flight.");
    describe_counter!("council_cache_misses_total", "Reads that went to the chain.");
    describe_counter!("council_cache_invalidations_total", "Cache entries invalidated.");
    describe_counter!("council_rpc_calls_total", "RPC calls by method.");
    describe_counter!("council_rpc_errors_total", "Failed RPC calls by method.");
    describe_histogram!(
        "council_rpc_call_latency_seconds",
        Unit::Seconds,
        "RPC call latency by method."
    );
    describe_counter!("council_tx_lifecycle_total", "Transaction lifecycle transitions by stage.");
}

pub fn increment_cache_hit(method: &str) {
    increment_counter!("council_cache_hits_total", "method" => method.to_string());
}

pub fn increment_cache_miss(method: &str) {
    increment_counter!("council_cache_misses_total", "method" => method.to_string());
}

pub fn increment_cache_invalidation(method: &str) {
    increment_counter!("council_cache_invalidations_total", "method" => method.to_string());
}

/// Records one RPC round trip.
pub fn record_rpc_call(method: &'static str, duration: Duration, success: bool) {
    increment_counter!("council_rpc_calls_total", "method" => method);
    if !success {
        increment_counter!("council_rpc_errors_total", "method" => method);
    }
    histogram!("council_rpc_call_latency_seconds", duration.as_secs_f64(), "method" => method);
}

pub fn increment_tx_stage(method: &str, stage: &'static str) {
    increment_counter!("council_tx_lifecycle_total", "method" => method.to_string(), "stage" => stage);
}

/// Failed invocation, labelled with the error kind.
pub fn increment_tx_error(method: &str, kind: &'static str) {
    increment_counter!(
        "council_tx_lifecycle_total",
        "method" => method.to_string(),
        "stage" => "error",
        "kind" => kind
    );
}

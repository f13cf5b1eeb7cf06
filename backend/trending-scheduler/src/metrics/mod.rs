//! Prometheus metrics for the scheduler process

use lazy_static::lazy_static;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

pub mod job_metrics;

lazy_static! {
    /// Registry for everything this process exports
    pub static ref REGISTRY: Registry = Registry::new();
}

/// Add the cache library's collectors to [`REGISTRY`]. Only processes that
/// read through `InkCache` (the API layer) have anything to report here.
pub fn register_cache_metrics() {
    if let Err(e) = inkspace_cache::CacheMetrics::register(&REGISTRY) {
        warn!(error = %e, "Cache metrics already registered");
    }
}

/// Render [`REGISTRY`] in the Prometheus text exposition format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

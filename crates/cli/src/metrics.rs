//! Prometheus registry for the command-line tool.
//!
//! Collects the core metrics (imports, searches, dropped query tokens and
//! verifier issues) into one registry for text output.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

use sampledrawer_core::metrics::all_metrics;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for metric in all_metrics() {
        if let Err(e) = registry.register(metric) {
            warn!("Cannot register metric: {}", e);
        }
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sampledrawer_core::metrics::SEARCHES_TOTAL;

    #[test]
    fn test_encode_metrics() {
        SEARCHES_TOTAL.with_label_values(&["items"]).inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("sampledrawer_searches_total"));
    }
}

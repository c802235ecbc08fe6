//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Library (imports)
//! - Search (queries, completions, dropped tokens)
//! - Verifier (issues found)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Library
// =============================================================================

/// Import attempts by result.
pub static IMPORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sampledrawer_imports_total", "Total file imports"),
        &["result"], // "imported", "conflict", "failed"
    )
    .unwrap()
});

// =============================================================================
// Search
// =============================================================================

/// Executed statements by kind.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sampledrawer_searches_total", "Total executed searches"),
        &["kind"], // "items", "completions", "raw"
    )
    .unwrap()
});

/// Query tokens that matched no condition syntax.
pub static DROPPED_QUERY_TOKENS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sampledrawer_dropped_query_tokens_total",
        "Query tokens dropped as unparsable",
    )
    .unwrap()
});

// =============================================================================
// Verifier
// =============================================================================

/// Problems found by the verifier, by question kind.
pub static VERIFIER_ISSUES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sampledrawer_verifier_issues_total",
            "Library inconsistencies found by the verifier",
        ),
        &["kind"],
    )
    .unwrap()
});

/// All core metrics, for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(IMPORTS_TOTAL.clone()),
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(DROPPED_QUERY_TOKENS.clone()),
        Box::new(VERIFIER_ISSUES.clone()),
    ]
}

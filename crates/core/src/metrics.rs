//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search orchestration (outcomes, latency)
//! - Acquisition queue (jobs, retries, throttling)
//! - Proxy pool, archive extraction, result cache and scratch janitor

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search
// =============================================================================

/// Searches total by outcome.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_searches_total", "Total subtitle searches"),
        &["outcome"], // "cache_hit", "completed", "empty", "timeout", "error"
    )
    .unwrap()
});

/// End-to-end search duration in seconds, measured by the background run.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subscout_search_duration_seconds",
            "Duration of a full search run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 4.5, 10.0, 30.0, 60.0, 120.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Candidates per listing page.
pub static CANDIDATES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subscout_candidates_found",
            "Number of candidates found per listing page",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &[],
    )
    .unwrap()
});

/// Listing page requests by result.
pub static LISTING_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_listing_requests_total", "Listing page requests"),
        &["result"], // "success", "throttled", "error"
    )
    .unwrap()
});

// =============================================================================
// Acquisition queue
// =============================================================================

/// Queue jobs by terminal outcome.
pub static QUEUE_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_queue_jobs_total", "Acquisition queue jobs"),
        &["outcome"], // "succeeded", "failed"
    )
    .unwrap()
});

/// Throttle-triggered retries.
pub static QUEUE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subscout_queue_retries_total",
        "Jobs requeued after a throttling response",
    )
    .unwrap()
});

/// Throttling signals per domain.
pub static THROTTLE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subscout_throttle_events_total",
            "Throttling responses received from upstream",
        ),
        &["domain"],
    )
    .unwrap()
});

// =============================================================================
// Proxy pool
// =============================================================================

/// Endpoints marked failed.
pub static PROXY_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("subscout_proxy_failures_total", "Proxy endpoints marked failed").unwrap()
});

/// Whole-pool resets after every endpoint failed.
pub static PROXY_RESETS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subscout_proxy_resets_total",
        "Proxy pool resets after all endpoints failed",
    )
    .unwrap()
});

// =============================================================================
// Archives
// =============================================================================

/// Archives extracted by format and mode.
pub static ARCHIVES_EXTRACTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_archives_extracted_total", "Archives extracted"),
        &["format", "mode"], // mode: "progressive", "buffered"
    )
    .unwrap()
});

/// Download plus extraction duration in seconds.
pub static EXTRACTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subscout_extraction_duration_seconds",
            "Duration of archive download and extraction",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["format"],
    )
    .unwrap()
});

/// Subtitle members written to scratch.
pub static MEMBERS_EXTRACTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subscout_members_extracted_total",
            "Subtitle files extracted from archives",
        ),
        &["format"],
    )
    .unwrap()
});

/// Archive bytes received.
pub static BYTES_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("subscout_bytes_downloaded_total", "Archive bytes downloaded").unwrap()
});

/// Decodes that fell back without a confident encoding match.
pub static LOW_CONFIDENCE_DECODES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subscout_low_confidence_decodes_total",
        "Subtitle decodes without a confident encoding match",
    )
    .unwrap()
});

// =============================================================================
// Cache and scratch
// =============================================================================

/// Cache operations by result.
pub static CACHE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_cache_operations_total", "Result cache operations"),
        &["operation", "result"],
    )
    .unwrap()
});

/// Scratch files removed by the janitor.
pub static SCRATCH_FILES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subscout_scratch_files_removed_total",
        "Scratch files removed by retention or size cap",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        Box::new(LISTING_REQUESTS.clone()),
        // Queue
        Box::new(QUEUE_JOBS.clone()),
        Box::new(QUEUE_RETRIES.clone()),
        Box::new(THROTTLE_EVENTS.clone()),
        // Proxy
        Box::new(PROXY_FAILURES.clone()),
        Box::new(PROXY_RESETS.clone()),
        // Archives
        Box::new(ARCHIVES_EXTRACTED.clone()),
        Box::new(EXTRACTION_DURATION.clone()),
        Box::new(MEMBERS_EXTRACTED.clone()),
        Box::new(BYTES_DOWNLOADED.clone()),
        Box::new(LOW_CONFIDENCE_DECODES.clone()),
        // Cache and scratch
        Box::new(CACHE_OPERATIONS.clone()),
        Box::new(SCRATCH_FILES_REMOVED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        SEARCHES.with_label_values(&["empty"]).inc();
        assert!(!registry.gather().is_empty());
    }
}

//! Metrics and observability utilities
//!
//! Prometheus-style metrics via the `metrics` facade, with standardized
//! naming for the scraping pipeline.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Diário Monitor metrics
pub const METRICS_PREFIX: &str = "diario";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_scrape_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Total scrape runs, labeled by source and status"
    );

    describe_counter!(
        format!("{}_candidates_scraped_total", METRICS_PREFIX),
        Unit::Count,
        "Total candidate records produced by scrapers"
    );

    describe_counter!(
        format!("{}_publications_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total publications persisted after dedup"
    );

    describe_histogram!(
        format!("{}_scrape_run_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Scrape run duration in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record per-run metrics
pub struct RunMetrics {
    start: Instant,
    source: String,
}

impl RunMetrics {
    /// Start tracking a scrape run
    pub fn start(source: &str) -> Self {
        Self {
            start: Instant::now(),
            source: source.to_string(),
        }
    }

    /// Record run completion
    pub fn finish(self, status: &str, candidates: u64, created: u64) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_scrape_runs_total", METRICS_PREFIX),
            "source" => self.source.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        counter!(
            format!("{}_candidates_scraped_total", METRICS_PREFIX),
            "source" => self.source.clone()
        )
        .increment(candidates);

        counter!(
            format!("{}_publications_created_total", METRICS_PREFIX),
            "source" => self.source.clone()
        )
        .increment(created);

        histogram!(
            format!("{}_scrape_run_duration_seconds", METRICS_PREFIX),
            "source" => self.source
        )
        .record(duration);
    }
}

//! Scrape run dispatch and daily fan-out
//!
//! Resolves the scraper for a (source, date) pair, runs it, forwards the
//! candidates to the ingestor, and reports a structured run summary. Runs for
//! distinct sources are fully independent: a failed run is a result, not a
//! fault, and never blocks sibling runs. Retries live inside the fetcher, not
//! here.

use crate::errors::ScrapeError;
use crate::ingest::PublicationIngestor;
use crate::sources::SourceRegistry;
use chrono::{NaiveDate, Utc};
use diario_common::cache::Cache;
use diario_common::metrics::RunMetrics;
use diario_common::queue::{Queue, ScrapeJobMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Run lifecycle: Pending → Running → {Completed, Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Structured summary of one scrape run; observability only, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRunResult {
    pub source_code: String,
    pub target_date: NaiveDate,
    pub status: RunStatus,
    pub candidates_found: usize,
    pub records_created: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl ScrapeRunResult {
    fn pending(source_code: &str, target_date: NaiveDate) -> Self {
        Self {
            source_code: source_code.to_string(),
            target_date,
            status: RunStatus::Pending,
            candidates_found: 0,
            records_created: 0,
            duration_ms: 0,
            error: None,
        }
    }

    fn failed(mut self, error: ScrapeError) -> Self {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self
    }
}

/// Target dates default to yesterday relative to invocation time.
pub fn default_target_date(today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(1)
}

pub struct Dispatcher {
    registry: SourceRegistry,
    ingestor: PublicationIngestor,
    queue: Option<Arc<Queue>>,
    cache: Option<Arc<Cache>>,
}

impl Dispatcher {
    pub fn new(registry: SourceRegistry, ingestor: PublicationIngestor) -> Self {
        Self {
            registry,
            ingestor,
            queue: None,
            cache: None,
        }
    }

    /// Attach the scrape job queue used by [`Dispatcher::run_daily`]
    pub fn with_queue(mut self, queue: Arc<Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Attach a cache for opportunistic run-summary storage
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run one source for one target date.
    ///
    /// Infallible surface: every outcome, including an unknown source code or
    /// a storage failure, comes back as a structured result.
    #[instrument(skip(self))]
    pub async fn run_one(&self, source_code: &str, target_date: NaiveDate) -> ScrapeRunResult {
        let started = std::time::Instant::now();
        let metrics = RunMetrics::start(source_code);
        let mut result = ScrapeRunResult::pending(source_code, target_date);

        let scraper = match self.registry.get(source_code) {
            Some(scraper) => scraper,
            None => {
                warn!(source_code, "No scraper registered for source");
                let mut result = result.failed(ScrapeError::UnknownSource(source_code.to_string()));
                result.duration_ms = started.elapsed().as_millis() as u64;
                metrics.finish("failed", 0, 0);
                return result;
            }
        };

        result.status = RunStatus::Running;

        let drafts = scraper.scrape_date(target_date).await;
        result.candidates_found = drafts.len();

        match self.ingestor.bulk_create(&drafts).await {
            Ok(created) => {
                result.records_created = created;
                result.status = RunStatus::Completed;
                info!(
                    source_code,
                    %target_date,
                    candidates = result.candidates_found,
                    created,
                    "Scrape run completed"
                );
            }
            Err(e) => {
                error!(source_code, %target_date, error = %e, "Scrape run failed");
                result = result.failed(e);
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;

        let status = match result.status {
            RunStatus::Completed => "completed",
            _ => "failed",
        };
        metrics.finish(
            status,
            result.candidates_found as u64,
            result.records_created,
        );

        self.cache_summary(&result).await;

        result
    }

    /// Fan out one scrape job per known source for yesterday's bulletin.
    ///
    /// Jobs are submitted to the external task queue independently; the
    /// returned message ids are the job handles. No result polling happens
    /// here.
    pub async fn run_daily(&self) -> Result<Vec<String>, ScrapeError> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| ScrapeError::Config("scrape queue not configured".to_string()))?;

        let target_date = default_target_date(Utc::now().date_naive());
        let mut handles = Vec::new();

        for source_code in self.registry.codes() {
            let message = ScrapeJobMessage {
                source_code: source_code.to_string(),
                target_date,
            };
            let handle = queue.send(&message).await?;
            info!(source_code, %target_date, job = %handle, "Scrape job submitted");
            handles.push(handle);
        }

        Ok(handles)
    }

    /// Cache the latest run summary per source; failures are logged, never
    /// fatal to the run.
    async fn cache_summary(&self, result: &ScrapeRunResult) {
        if let Some(cache) = &self.cache {
            let key = format!("scrape:last_run:{}", result.source_code);
            if let Err(e) = cache.set(&key, result).await {
                warn!(error = %e, "Failed to cache run summary");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{AlwaysFailing, FixedPage};
    use crate::fetcher::Fetcher;
    use crate::ingest::testing::{FailingStore, MemoryStore};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const TJSP_PAGE: &str = r#"
        <html><body>
          <div class="publicacao-item">
            Intimação - Processo nº 1234567-12.2024.8.26.0100 - Autor: João Silva
          </div>
        </body></html>
    "#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[tokio::test]
    async fn test_run_one_completes_and_counts() {
        let transport = Arc::new(FixedPage::new(TJSP_PAGE));
        let fetcher = Arc::new(Fetcher::new(transport, 1, Duration::ZERO));
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(
            SourceRegistry::builtin(fetcher),
            PublicationIngestor::new(store.clone()),
        );

        let result = dispatcher.run_one("TJSP", date()).await;

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.candidates_found, 1);
        assert_eq!(result.records_created, 1);
        assert!(result.error.is_none());
        assert_eq!(store.row_count(), 1);

        // A second run of the same (source, date) creates nothing new
        let again = dispatcher.run_one("TJSP", date()).await;
        assert_eq!(again.status, RunStatus::Completed);
        assert_eq!(again.records_created, 0);
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_fails_without_fetching() {
        let transport = Arc::new(AlwaysFailing::new());
        let fetcher = Arc::new(Fetcher::new(transport.clone(), 1, Duration::ZERO));
        let dispatcher = Dispatcher::new(
            SourceRegistry::builtin(fetcher),
            PublicationIngestor::new(Arc::new(MemoryStore::new())),
        );

        let result = dispatcher.run_one("XX", date()).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.candidates_found, 0);
        assert_eq!(result.records_created, 0);
        assert!(result.error.as_deref().unwrap().contains("XX"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_zero_result_run() {
        let transport = Arc::new(AlwaysFailing::new());
        let fetcher = Arc::new(Fetcher::new(transport.clone(), 3, Duration::ZERO));
        let dispatcher = Dispatcher::new(
            SourceRegistry::builtin(fetcher),
            PublicationIngestor::new(Arc::new(MemoryStore::new())),
        );

        let result = dispatcher.run_one("TJSP", date()).await;

        // The fetch failure is absorbed by the scraper; the run completes
        // with zero candidates rather than failing
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.candidates_found, 0);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_failed_run() {
        let transport = Arc::new(FixedPage::new(TJSP_PAGE));
        let fetcher = Arc::new(Fetcher::new(transport, 1, Duration::ZERO));
        let dispatcher = Dispatcher::new(
            SourceRegistry::builtin(fetcher),
            PublicationIngestor::new(Arc::new(FailingStore::new(0))),
        );

        let result = dispatcher.run_one("TJSP", date()).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.candidates_found, 1);
        assert_eq!(result.records_created, 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_run_daily_without_queue_is_a_config_error() {
        let fetcher = Arc::new(Fetcher::new(
            Arc::new(AlwaysFailing::new()),
            1,
            Duration::ZERO,
        ));
        let dispatcher = Dispatcher::new(
            SourceRegistry::builtin(fetcher),
            PublicationIngestor::new(Arc::new(MemoryStore::new())),
        );

        let err = dispatcher.run_daily().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn test_default_target_date_is_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            default_target_date(today),
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
        );

        // Month boundary
        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            default_target_date(first),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}

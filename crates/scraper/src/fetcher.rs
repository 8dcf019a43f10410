//! Resilient page fetching
//!
//! One HTTP GET with a per-attempt timeout, a shared connection budget across
//! all sources, and exponential-backoff retries. The fetcher knows nothing
//! about page content.

use crate::errors::ScrapeError;
use async_trait::async_trait;
use diario_common::config::ScraperConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;

/// One failed fetch attempt
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("connection budget closed")]
    BudgetClosed,
}

/// Transport seam: a single GET attempt against a URL.
///
/// Production uses [`HttpPageSource`]; tests substitute counting or scripted
/// fakes so retry behavior is deterministic.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchFailure>;
}

/// HTTP transport over a shared `reqwest` client.
///
/// The semaphore bounds total in-flight connections across all sources;
/// keep-alive connections are capped per host by the client pool.
pub struct HttpPageSource {
    client: reqwest::Client,
    budget: Semaphore,
}

impl HttpPageSource {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            budget: Semaphore::new(config.max_connections),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get(&self, url: &str) -> Result<String, FetchFailure> {
        let _permit = self
            .budget
            .acquire()
            .await
            .map_err(|_| FetchFailure::BudgetClosed)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Delay before re-running 0-indexed attempt `attempt + 1`: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Retrying fetch primitive shared by all source scrapers.
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    max_attempts: u32,
    base_delay: Duration,
}

impl Fetcher {
    /// Build over an explicit transport; attempt budget and base delay are
    /// injectable so tests run without real sleeping.
    pub fn new(source: Arc<dyn PageSource>, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Build the production fetcher from configuration.
    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self::new(
            Arc::new(HttpPageSource::new(config)?),
            config.max_attempts,
            Duration::from_secs(config.backoff_base_secs),
        ))
    }

    /// Fetch with the configured attempt budget.
    pub async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.fetch_with_attempts(url, self.max_attempts).await
    }

    /// Fetch with an explicit attempt budget.
    ///
    /// Retries transport and non-2xx failures with exponential backoff; an
    /// exhausted budget surfaces the last underlying failure, never empty
    /// content.
    pub async fn fetch_with_attempts(
        &self,
        url: &str,
        max_attempts: u32,
    ) -> Result<String, ScrapeError> {
        let max_attempts = max_attempts.max(1);
        let mut last_failure = FetchFailure::BudgetClosed;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(self.base_delay, attempt - 1)).await;
            }

            match self.source.get(url).await {
                Ok(body) => return Ok(body),
                Err(failure) => {
                    warn!(url, attempt, error = %failure, "Fetch attempt failed");
                    last_failure = failure;
                }
            }
        }

        Err(ScrapeError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last: last_failure,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport fake that fails every attempt and counts calls.
    pub struct AlwaysFailing {
        pub calls: AtomicU32,
    }

    impl AlwaysFailing {
        pub fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for AlwaysFailing {
        async fn get(&self, url: &str) -> Result<String, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchFailure::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    /// Transport fake that fails a fixed number of times, then serves a body.
    pub struct FlakyThenOk {
        pub failures_before_success: u32,
        pub body: String,
        pub calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for FlakyThenOk {
        async fn get(&self, url: &str) -> Result<String, FetchFailure> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(FetchFailure::Status {
                    url: url.to_string(),
                    status: 500,
                })
            } else {
                Ok(self.body.clone())
            }
        }
    }

    /// Transport fake serving a fixed page for any URL.
    pub struct FixedPage {
        pub body: String,
        pub calls: AtomicU32,
    }

    impl FixedPage {
        pub fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for FixedPage {
        async fn get(&self, _url: &str) -> Result<String, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }
}

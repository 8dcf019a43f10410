//! Diário Monitor Scraping Worker
//!
//! Consumes scrape jobs from the SQS queue:
//! 1. Receives a (source, date) job message
//! 2. Scrapes the source's bulletin for that date
//! 3. Ingests candidates with duplicate suppression
//! 4. Records the run summary
//!
//! Also supports one-shot invocation (`run <SOURCE> [YYYY-MM-DD]`) and the
//! daily fan-out (`daily`), which submits one job per known source.

mod dispatcher;
mod errors;
mod extract;
mod fetcher;
mod ingest;
mod sources;

use crate::dispatcher::{default_target_date, Dispatcher, RunStatus};
use crate::fetcher::Fetcher;
use crate::ingest::PublicationIngestor;
use crate::sources::SourceRegistry;
use chrono::{NaiveDate, Utc};
use diario_common::cache::{Cache, CacheConfig};
use diario_common::config::AppConfig;
use diario_common::db::{DbPool, Repository};
use diario_common::queue::{Queue, QueueConfig, ScrapeJobMessage};
use diario_common::VERSION;
use std::sync::Arc;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Diário Monitor scraping worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    diario_common::metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    // Wire the pipeline
    let fetcher = Arc::new(Fetcher::from_config(&config.scraper)?);
    let registry = SourceRegistry::builtin(fetcher);
    let ingestor = PublicationIngestor::new(Arc::new(repository));
    let mut dispatcher = Dispatcher::new(registry, ingestor);

    // Cache is opportunistic: missing Redis only costs the run summaries
    let cache_config = CacheConfig {
        url: config.redis.url.clone(),
        default_ttl_secs: config.redis.default_ttl_secs,
        ..Default::default()
    };
    match Cache::new(cache_config).await {
        Ok(cache) => dispatcher = dispatcher.with_cache(Arc::new(cache)),
        Err(e) => warn!(error = %e, "Cache unavailable, run summaries will not be stored"),
    }

    // Scrape job queue, when configured
    let queue = match &config.queue.scrape_queue_url {
        Some(url) => {
            info!(url = %url, "Connecting to scrape queue...");
            let queue_config = QueueConfig {
                url: url.clone(),
                visibility_timeout: config.queue.visibility_timeout_secs as i32,
                wait_time_seconds: config.queue.poll_timeout_secs as i32,
                max_messages: config.queue.batch_size as i32,
            };
            Some(Arc::new(Queue::new(queue_config).await?))
        }
        None => None,
    };
    if let Some(queue) = &queue {
        dispatcher = dispatcher.with_queue(queue.clone());
    }

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        // One-shot mode: scrape one source for one date and print the summary
        Some("run") => {
            let source_code = args.get(2).ok_or("usage: scraper run <SOURCE> [YYYY-MM-DD]")?;
            let target_date = match args.get(3) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")?,
                None => default_target_date(Utc::now().date_naive()),
            };

            let result = dispatcher.run_one(source_code, target_date).await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if result.status == RunStatus::Failed {
                std::process::exit(1);
            }
            return Ok(());
        }

        // Fan-out mode: submit one scrape job per known source for yesterday
        Some("daily") => {
            let handles = dispatcher.run_daily().await?;
            info!(jobs = handles.len(), "Daily scrape jobs submitted");
            println!("{}", serde_json::to_string_pretty(&handles)?);
            return Ok(());
        }

        _ => {}
    }

    // Service mode: poll the scrape queue
    let queue = match queue {
        Some(queue) => queue,
        None => {
            warn!("Scrape queue not configured, waiting for shutdown signal...");
            tokio::signal::ctrl_c().await?;
            info!("Scraping worker shutting down");
            return Ok(());
        }
    };

    info!("Scraping worker ready, starting queue polling...");

    // Circuit breaker state
    let mut consecutive_failures = 0u32;
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: std::time::Duration = std::time::Duration::from_secs(30);

    loop {
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive::<ScrapeJobMessage>() => {
                match result {
                    Ok(jobs) => {
                        for (job, receipt_handle) in jobs {
                            info!(
                                source = %job.source_code,
                                target_date = %job.target_date,
                                "Received scrape job"
                            );

                            let run = dispatcher.run_one(&job.source_code, job.target_date).await;

                            match run.status {
                                RunStatus::Failed => {
                                    consecutive_failures += 1;
                                    error!(
                                        source = %run.source_code,
                                        error = run.error.as_deref().unwrap_or("unknown"),
                                        failures = consecutive_failures,
                                        "Scrape run failed"
                                    );
                                }
                                _ => {
                                    consecutive_failures = 0;
                                }
                            }

                            // Runs are not retried at this layer; the summary
                            // is final either way, so the job is done
                            if let Err(e) = queue.delete(&receipt_handle).await {
                                error!(error = %e, "Failed to delete message");
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Scraping worker shutting down");
    Ok(())
}

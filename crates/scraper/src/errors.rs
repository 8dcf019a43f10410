//! Scraping pipeline error types

use crate::fetcher::FetchFailure;
use diario_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("fetch failed for {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: FetchFailure,
    },

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("unknown source code: {0}")]
    UnknownSource(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AppError> for ScrapeError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::QueueError { message } => ScrapeError::Queue(message),
            AppError::Configuration { message } => ScrapeError::Config(message),
            other => ScrapeError::Persistence(other.to_string()),
        }
    }
}

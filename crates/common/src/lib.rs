//! Diário Monitor Common Library
//!
//! Shared code for the Diário Monitor services including:
//! - Database models and the publication repository
//! - Error types and handling
//! - Configuration management
//! - Redis cache client
//! - SQS queue wrapper for scrape jobs
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod queue;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{PublicationStore, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of party names kept per publication
pub const MAX_PARTIES: usize = 10;

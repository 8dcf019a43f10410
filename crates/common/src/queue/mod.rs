//! SQS queue integration for scrape job dispatch
//!
//! Provides:
//! - SQS client wrapper with retry on send
//! - Typed JSON message serialization/deserialization
//!
//! The dispatcher only ever submits a job and receives a message id back;
//! result polling is not part of this boundary.

use crate::errors::{AppError, Result};
use aws_sdk_sqs::Client as SqsClient;
use backoff::{future::retry, ExponentialBackoff};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// SQS queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub url: String,
    /// Visibility timeout in seconds
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
    /// Maximum number of messages per poll
    pub max_messages: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            visibility_timeout: 300,
            wait_time_seconds: 20,
            max_messages: 10,
        }
    }
}

/// SQS queue client wrapper
pub struct Queue {
    client: SqsClient,
    config: QueueConfig,
}

impl Queue {
    /// Create a new queue client
    pub async fn new(config: QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, config })
    }

    /// Create with an existing AWS client
    pub fn with_client(client: SqsClient, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Submit a job message, returning its message id (the job handle)
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<String> {
        let body = serde_json::to_string(message).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })?;

        let result = retry(ExponentialBackoff::default(), || async {
            self.client
                .send_message()
                .queue_url(&self.config.url)
                .message_body(&body)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(AppError::QueueError {
                        message: format!("Failed to send message: {}", e),
                    })
                })
        })
        .await?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Receive typed messages along with their receipt handles
    pub async fn receive<T: DeserializeOwned>(&self) -> Result<Vec<(T, String)>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.config.url)
            .max_number_of_messages(self.config.max_messages)
            .visibility_timeout(self.config.visibility_timeout)
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        let mut jobs = Vec::with_capacity(messages.len());
        for message in messages {
            let body = message.body.as_deref().ok_or_else(|| AppError::QueueError {
                message: "Message has no body".to_string(),
            })?;
            let receipt = message
                .receipt_handle
                .clone()
                .ok_or_else(|| AppError::QueueError {
                    message: "Message has no receipt handle".to_string(),
                })?;

            let parsed = serde_json::from_str(body).map_err(|e| AppError::QueueError {
                message: format!("Failed to parse message: {}", e),
            })?;
            jobs.push((parsed, receipt));
        }

        Ok(jobs)
    }

    /// Delete a message after processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }
}

/// Scrape job message: run one source for one target date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJobMessage {
    pub source_code: String,
    pub target_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_job_serialization() {
        let msg = ScrapeJobMessage {
            source_code: "TJSP".to_string(),
            target_date: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ScrapeJobMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(msg.source_code, parsed.source_code);
        assert_eq!(msg.target_date, parsed.target_date);
    }
}

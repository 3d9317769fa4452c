//! Resubmission with exponential backoff
//!
//! The publication core never retries on its own. This module is used by the
//! command-line boundary to resubmit a whole upload, which is safe because
//! the import and the create steps are idempotent.

use crate::core::config::RetryConfig;
use crate::core::error::PublishError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Options for retry behavior
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts (1 disables retrying)
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

/// Retry manager for executing operations with exponential backoff
///
/// # Examples
///
/// ```no_run
/// use shapefile_publisher::core::{PublishError, RetryManager, RetryOptions};
///
/// # async fn run() -> Result<(), PublishError> {
/// let manager = RetryManager::new(RetryOptions::default());
///
/// let value = manager.retry(|| async { Ok::<_, PublishError>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    /// Create a new RetryManager with the given options
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Execute the given async operation, retrying retryable errors
    ///
    /// Non-retryable errors (see [`PublishError::is_retryable`]) are returned
    /// immediately.
    pub async fn retry<F, Fut, T>(&self, mut operation: F) -> Result<T, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PublishError>>,
    {
        let mut delay = self.options.initial_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !error.is_retryable() || attempt >= self.options.max_attempts {
                        return Err(error);
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts = self.options.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retryable failure, resubmitting"
                    );

                    sleep(delay).await;

                    delay = Duration::from_secs_f64(
                        delay.as_secs_f64() * self.options.backoff_multiplier,
                    )
                    .min(self.options.max_delay);
                    attempt += 1;
                }
            }
        }
    }
}

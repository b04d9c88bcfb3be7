//! Retry utilities for provider HTTP calls with exponential backoff.
//!
//! Retried: timeouts, connection failures, 5xx, 408 and 429.
//! Not retried: any other 4xx (bad key, bad coordinates, ...).

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::error::{NetworkError, ReqwestErrorExt};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Whether a status code is worth another attempt
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Whether a transport error is worth another attempt
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    error.status().is_some_and(is_retryable_status)
}

/// Execute an HTTP request with retry logic.
///
/// Returns the first non-retryable response (success or not) so the caller
/// can map provider-specific statuses. A retryable status on the final
/// attempt is also returned as-is.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<Response, NetworkError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            tracing::info!(
                "{}: retry {} of {}, waiting {:?}",
                operation_name,
                attempt,
                config.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        let exhausted = attempt >= config.max_retries;

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) && !exhausted {
                    tracing::warn!(
                        "{}: retryable status {} on attempt {}",
                        operation_name,
                        status,
                        attempt + 1
                    );
                } else {
                    if attempt > 0 {
                        tracing::info!("{}: completed after {} retries", operation_name, attempt);
                    }
                    return Ok(response);
                }
            }
            Err(e) => {
                if !is_retryable_error(&e) || exhausted {
                    tracing::debug!("{}: giving up: {}", operation_name, e);
                    return Err(e.into_network_error());
                }
                tracing::warn!(
                    "{}: retryable error on attempt {}: {}",
                    operation_name,
                    attempt + 1,
                    e
                );
            }
        }

        attempt += 1;
    }
}

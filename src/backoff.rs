//! Exponential backoff for transient infrastructure failures.
//!
//! This layer only ever retries the *same* call after timeouts, rate limits
//! and server errors. Bad output is a quality failure and is handled by the
//! attempt loop in [`crate::retry`], which has its own, separate budget.

use std::future::Future;
use std::time::Duration;

/// Transport-level failure talking to a remote service.
#[derive(Debug, thiserror::Error)]
pub enum InfraError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    /// Auth failures, bad requests, missing keys. Retrying won't help.
    #[error("{0}")]
    Fatal(String),
}

impl InfraError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InfraError::Fatal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            InfraError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InfraError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            InfraError::Network(err.to_string())
        } else {
            InfraError::Fatal(err.to_string())
        }
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = crate::util::truncate(body.trim(), 200);
        match status {
            408 => InfraError::Timeout(message),
            429 => InfraError::RateLimited {
                retry_after: parse_retry_after(body).map(Duration::from_secs),
                message,
            },
            500..=599 => InfraError::Server { status, message },
            401 | 403 => InfraError::Fatal(format!("API key rejected ({}): {}", status, message)),
            _ => InfraError::Fatal(format!("API error {}: {}", status, message)),
        }
    }
}

/// Extract a "retry after N seconds" hint from an error body, if present.
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    for word in text_lower[pos..].split_whitespace().skip(1).take(5) {
        if let Ok(secs) = word
            .trim_matches(|c: char| !c.is_ascii_digit())
            .parse::<u64>()
        {
            if secs > 0 && secs < 300 {
                return Some(secs);
            }
        }
    }
    None
}

/// How a single outbound call is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total tries including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_delay: Duration::from_secs(15),
            multiplier: 2,
            max_delay: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    /// Single try, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, InfraError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InfraError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut retry_count = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || retry_count + 1 >= max_attempts {
                        return Err(err);
                    }
                    retry_count += 1;
                    let delay = err
                        .retry_after()
                        .map(|hint| hint.min(self.max_delay))
                        .unwrap_or_else(|| self.delay_for(retry_count));
                    tracing::warn!(
                        operation,
                        error = %err,
                        retry = retry_count,
                        max_retries = max_attempts - 1,
                        delay_secs = delay.as_secs(),
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

//! Request-layer retry with linear backoff.

use crate::config::RetrySettings;
use crate::error::{BenchError, Result, CONNECTIVITY_CHECKLIST};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Up to `max_retries` attempts; attempt `n` failing transiently waits
/// `retry_delay * n` before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let settings = RetrySettings::default();
        Self::new(settings.max_retries, settings.retry_delay)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_retries, settings.retry_delay)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay * attempt
    }

    /// Run `operation`, retrying transient failures only. Non-transient errors
    /// are returned untouched on the attempt they occur.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed on attempt {}/{}: {}; retrying in {:?}",
                        label, attempt, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => return Err(self.exhausted(label, e)),
                Err(e) => return Err(e),
            }
        }
    }

    fn exhausted(&self, label: &str, err: BenchError) -> BenchError {
        match err {
            BenchError::Timeout(detail) => BenchError::Timeout(format!(
                "{} timed out after {} attempts: {}\n{}",
                label, self.max_retries, detail, CONNECTIVITY_CHECKLIST
            )),
            BenchError::Connection(detail) => BenchError::Connection(format!(
                "{} failed to connect after {} attempts: {}\n{}",
                label, self.max_retries, detail, CONNECTIVITY_CHECKLIST
            )),
            other => other,
        }
    }
}

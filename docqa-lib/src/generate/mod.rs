//! Text generation backends
//!
//! A [`Generator`] turns an assembled prompt into an answer. The watsonx.ai
//! backend authenticates through an IAM token exchange and keeps the bearer
//! token cached until it expires or is rejected.
//!
//! # Failure semantics
//!
//! - Token exchange failure: [`Error::Credential`], returned as an error.
//! - Generation endpoint non-success: [`Error::Upstream`] from
//!   [`WatsonxClient::generate_checked`]; [`Generator::generate`] turns it into
//!   the answer text `Error: <status> - <body>` so the caller still gets an
//!   answer.
//! - Either call running past its timeout: [`Error::UpstreamTimeout`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Error, Result};

/// Trait for text generation services
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer for a fully assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Returns the model name/identifier
    fn model_id(&self) -> &str;
}

mod credentials;
mod watsonx;

pub use credentials::*;
pub use watsonx::*;

/// Bounded retry with exponential backoff for retryable failures.
///
/// Generation calls are metered, so retrying is opt-in: the default policy
/// makes a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn bounded(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: initial_backoff * 16,
        }
    }

    /// Delay before attempt `attempt + 1`, doubling each time.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "retrying generation call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Map a reqwest failure onto the error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, what: &str) -> Error {
    if e.is_timeout() {
        Error::UpstreamTimeout(format!("{what} timed out"))
    } else {
        Error::Transport(format!("{what}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::bounded(10, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_does_not_retry() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::default()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::UpstreamTimeout("generation".into()))
            })
            .await;

        assert!(matches!(result, Err(Error::UpstreamTimeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_retryable_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = RetryPolicy::bounded(3, Duration::from_secs(1))
            .run(move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::Upstream { status: 503, body: String::new() }),
                    1 => Err(Error::UpstreamTimeout("generation".into())),
                    _ => Ok("answer"),
                }
            })
            .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::bounded(2, Duration::from_secs(1))
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Upstream { status: 500, body: String::new() })
            })
            .await;

        assert!(matches!(result, Err(Error::Upstream { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_fatal_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::bounded(5, Duration::from_secs(1))
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Credential { status: Some(401), message: String::new() })
            })
            .await;

        assert!(matches!(result, Err(Error::Credential { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

use std::time::Duration;

use rand::Rng;

use super::{ChatProvider, CompletionRequest, CompletionResponse, ProviderError};

/// Bounded retry with jittered exponential backoff for inference calls.
///
/// Only retryable failures (timeouts, transport errors) are retried; a
/// malformed response is returned to the caller immediately, where it is
/// handled as a branch-level failure.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries; useful in tests.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Invoke the provider, retrying retryable failures up to the attempt cap.
    pub async fn complete(
        &self,
        provider: &dyn ChatProvider,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match provider.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "inference call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = self.base_delay.saturating_mul(1 << (attempt - 1).min(8));
        if exp.is_zero() {
            return exp;
        }
        // Full jitter keeps concurrent branches from retrying in lockstep.
        let jitter = rand::rng().random_range(0..=exp.as_millis() as u64);
        Duration::from_millis(jitter)
    }
}

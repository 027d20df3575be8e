use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::collaborators::CollaboratorError;
use super::orchestrator::PipelineError;

/// Bounded exponential backoff for transient collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a single collaborator call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry budget is
    /// spent. Each attempt is bounded by `call_timeout`. `retries` is the budget already
    /// used by earlier calls of the same transition and is shared with them.
    pub async fn run<T, F, Fut>(
        &self,
        service: &str,
        retries: &mut u32,
        mut operation: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        loop {
            let result = match tokio::time::timeout(self.call_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::timeout(service).into()),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && *retries < self.max_retries => {
                    let delay = self.backoff_for(*retries);
                    *retries += 1;
                    tracing::warn!(
                        service,
                        retry = *retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient collaborator failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) if error.is_transient() => {
                    return Err(PipelineError::RetriesExhausted {
                        service: service.to_string(),
                        retries: *retries,
                        last_error: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

// Bounded retry with a fixed delay around fetch + extract

use crate::config::SourceConfig;
use crate::error::{IngestError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Where a retried operation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Succeeded { attempts: u32 },
    ExhaustedFailed { attempts: u32 },
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RetryState::Attempting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(source: &SourceConfig) -> Self {
        Self::new(
            source.retry_attempts,
            Duration::from_secs(source.retry_delay_secs),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// State after an attempt in `state` finishes
    ///
    /// Terminal states never change. A failed attempt leads to the next one
    /// until `max_attempts` have been made.
    pub fn transition(&self, state: RetryState, succeeded: bool) -> RetryState {
        match state {
            RetryState::Attempting { attempt } if succeeded => {
                RetryState::Succeeded { attempts: attempt }
            },
            RetryState::Attempting { attempt } if attempt < self.max_attempts => {
                RetryState::Attempting {
                    attempt: attempt + 1,
                }
            },
            RetryState::Attempting { attempt } => RetryState::ExhaustedFailed { attempts: attempt },
            terminal => terminal,
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. Only transient errors (see
    /// [`IngestError::is_transient`]) are retried; exhaustion is reported as
    /// [`IngestError::RetriesExhausted`] carrying the last extraction error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            let error = match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Succeeded after retrying");
                    }
                    return Ok(value);
                },
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            match (self.transition(RetryState::Attempting { attempt }, false), error) {
                (RetryState::Attempting { attempt: next }, error) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = self.delay.as_secs(),
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt = next;
                },
                (_, IngestError::Extraction(last)) => {
                    return Err(IngestError::RetriesExhausted {
                        attempts: attempt,
                        last,
                    });
                },
                (_, error) => return Err(error),
            }
        }
    }
}

//! # Retry Module
//!
//! Runs a transport operation under the queue manager's [`QueueRetryPolicy`].
//! Every failed attempt is retried after a fixed delay until the policy's
//! attempts run out. A call that still fails counts once toward the circuit
//! breaker. Cancellation aborts the wait between attempts.

use crate::circuit_breaker::{CircuitBreaker, CircuitMetrics, CircuitState};
use crate::error::TransportError;
use crate::model::QueueRetryPolicy;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a retry-wrapped call did not produce a value
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

/// Admission to the circuit for one call.
///
/// Dropping an unsettled permit hands back the slot without counting the
/// call, so an abandoned half-open trial frees the circuit.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn acquire(breaker: &'a CircuitBreaker) -> Option<Self> {
        breaker.try_acquire().ok().map(|_| Self {
            breaker,
            settled: false,
        })
    }

    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release();
        }
    }
}

/// Applies retry and circuit breaker policy around transport calls.
///
/// One executor is shared by every call on a client so the circuit sees the
/// combined failure history of connect, put and get.
#[derive(Debug)]
pub struct RetryExecutor {
    policy: QueueRetryPolicy,
    breaker: CircuitBreaker,
}

impl RetryExecutor {
    /// Create executor for a retry policy
    pub fn new(policy: QueueRetryPolicy) -> Self {
        let breaker = CircuitBreaker::from_policy(&policy);
        Self { policy, breaker }
    }

    /// Get the retry policy
    pub fn policy(&self) -> &QueueRetryPolicy {
        &self.policy
    }

    /// Get current circuit state
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Get circuit breaker metrics
    pub fn circuit_metrics(&self) -> CircuitMetrics {
        self.breaker.metrics()
    }

    /// Run `operation` until it succeeds, runs out of attempts or is
    /// cancelled.
    ///
    /// `operation` receives the 1-based attempt number. An open circuit
    /// rejects the call before `operation` is ever invoked.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        cancellation: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let Some(permit) = CallPermit::acquire(&self.breaker) else {
            debug!(operation = operation_name, "Call rejected by open circuit");
            return Err(RetryError::CircuitOpen);
        };

        let max_attempts = self.policy.max_attempts();
        let delay = self.policy.retry_delay();
        let mut attempt = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            let error = match operation(attempt).await {
                Ok(value) => {
                    permit.succeed();
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= max_attempts {
                permit.fail();
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                delay_secs = delay.as_secs(),
                transient = error.is_transient(),
                error = %error,
                "Attempt failed, retrying"
            );

            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

//! Circuit breaker protecting the queue manager from call pile-ups.
//!
//! # Circuit Breaker States
//!
//! - **Closed**: Normal operation, calls pass through
//! - **Open**: Calls are rejected without touching the transport
//! - **Half-Open**: Exactly one trial call is admitted
//!
//! A call reports its outcome once, after its retries are finished. A
//! zero failure threshold disables the breaker; the circuit then stays
//! closed forever.

use crate::model::QueueRetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

// ============================================================================
// Circuit State
// ============================================================================

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls pass through while consecutive failures are counted.
    Closed,

    /// Calls are rejected until the recovery timeout elapses.
    Open,

    /// A single trial call decides whether the circuit closes again.
    HalfOpen,
}

impl CircuitState {
    /// Check if requests are allowed in current state.
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Thresholds controlling when the circuit trips and recovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed calls that open the circuit (0 disables tripping).
    pub failure_threshold: u32,

    /// Time the circuit stays open before a trial call is admitted.
    pub recovery_timeout: Duration,
}

impl From<&QueueRetryPolicy> for CircuitBreakerConfig {
    fn from(policy: &QueueRetryPolicy) -> Self {
        Self {
            failure_threshold: policy.circuit_breaker_exception_allowed_count,
            recovery_timeout: policy.circuit_open_duration(),
        }
    }
}

// ============================================================================
// Metrics and Errors
// ============================================================================

/// Snapshot of circuit breaker statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub consecutive_failures: u32,
}

/// Why the circuit breaker refused to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CircuitBreakerError {
    #[error("Circuit breaker is open - calls rejected")]
    CircuitOpen,

    #[error("Circuit breaker is half-open and its trial call is in progress")]
    TrialInProgress,
}

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct InternalState {
    current_state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    rejected_calls: u64,
}

impl InternalState {
    fn new() -> Self {
        Self {
            current_state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
        }
    }
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Thread-safe circuit breaker shared by every call on one client.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<InternalState>,
}

impl CircuitBreaker {
    /// Create new circuit breaker with configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(InternalState::new()),
        }
    }

    /// Create circuit breaker from a retry policy's thresholds.
    pub fn from_policy(policy: &QueueRetryPolicy) -> Self {
        Self::new(CircuitBreakerConfig::from(policy))
    }

    // Counters stay consistent even if a holder panicked, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, InternalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to start a call.
    ///
    /// Moves an open circuit to half-open once the recovery timeout has
    /// elapsed, handing the single trial slot to this caller. Every admitted
    /// call must end with [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure) or
    /// [`release`](Self::release).
    pub fn try_acquire(&self) -> Result<(), CircuitBreakerError> {
        let mut state = self.lock();

        match state.current_state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let recovered = state
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);

                if recovered {
                    state.current_state = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    info!("Circuit breaker half-open, admitting trial call");
                    Ok(())
                } else {
                    state.rejected_calls += 1;
                    Err(CircuitBreakerError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    state.rejected_calls += 1;
                    Err(CircuitBreakerError::TrialInProgress)
                } else {
                    state.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a call that succeeded.
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.total_calls += 1;
        state.successful_calls += 1;
        state.consecutive_failures = 0;

        if state.current_state == CircuitState::HalfOpen {
            info!("Trial call succeeded, circuit breaker closed");
            Self::close(&mut state);
        }
    }

    /// Record a call that failed after exhausting its retries.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.total_calls += 1;
        state.failed_calls += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        match state.current_state {
            CircuitState::Closed => {
                if self.config.failure_threshold > 0
                    && state.consecutive_failures >= self.config.failure_threshold
                {
                    warn!(
                        consecutive_failures = state.consecutive_failures,
                        recovery_timeout_secs = self.config.recovery_timeout.as_secs(),
                        "Circuit breaker opened"
                    );
                    Self::trip(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                warn!("Trial call failed, circuit breaker re-opened");
                Self::trip(&mut state);
            }
            CircuitState::Open => {}
        }
    }

    /// End an admitted call without counting it either way.
    ///
    /// Frees the half-open trial slot so the next caller can take it.
    pub fn release(&self) {
        let mut state = self.lock();
        if state.current_state == CircuitState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    fn trip(state: &mut InternalState) {
        state.current_state = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        state.trial_in_flight = false;
    }

    fn close(state: &mut InternalState) {
        state.current_state = CircuitState::Closed;
        state.opened_at = None;
        state.trial_in_flight = false;
        state.consecutive_failures = 0;
    }

    /// Get current circuit breaker state.
    pub fn state(&self) -> CircuitState {
        self.lock().current_state
    }

    /// Get circuit breaker metrics and statistics.
    pub fn metrics(&self) -> CircuitMetrics {
        let state = self.lock();
        CircuitMetrics {
            state: state.current_state,
            total_calls: state.total_calls,
            successful_calls: state.successful_calls,
            failed_calls: state.failed_calls,
            rejected_calls: state.rejected_calls,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// Reset circuit breaker to closed state, clearing all counters.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = InternalState::new();
    }
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;

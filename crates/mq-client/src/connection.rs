//! Connection lifecycle for a single queue manager.
//!
//! The [`ConnectionManager`] owns the transport handle. Every transport call
//! on the handle happens while its async mutex is held, so one connection
//! never serves two calls at once.

use crate::circuit_breaker::{CircuitMetrics, CircuitState};
use crate::error::{FailureReason, QueueManagerError};
use crate::model::QueueManagerModel;
use crate::retry::{RetryError, RetryExecutor};
use crate::transport::{QueueConnection, QueueTransport};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

/// Slot holding the live transport handle, if any
pub(crate) type HandleSlot = Option<Box<dyn QueueConnection>>;

/// Lifecycle state of a connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Resets the state to disconnected if a connect attempt is abandoned
struct ConnectingGuard<'a> {
    state: &'a StdMutex<ConnectionState>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
                ConnectionState::Disconnected;
        }
    }
}

/// Owns the connection to one named queue manager.
///
/// There is no automatic reconnect: once the transport reports the
/// connection broken the handle is dropped and `connect` must be called
/// again.
pub struct ConnectionManager {
    model: Arc<QueueManagerModel>,
    transport: Arc<dyn QueueTransport>,
    executor: RetryExecutor,
    handle: Mutex<HandleSlot>,
    state: StdMutex<ConnectionState>,
}

impl ConnectionManager {
    /// Create a disconnected manager for a model and transport
    pub fn new(model: QueueManagerModel, transport: Arc<dyn QueueTransport>) -> Self {
        let executor = RetryExecutor::new(model.retry_policy.clone());

        Self {
            model: Arc::new(model),
            transport,
            executor,
            handle: Mutex::new(None),
            state: StdMutex::new(ConnectionState::Disconnected),
        }
    }

    /// Get the queue manager model
    pub fn model(&self) -> &QueueManagerModel {
        &self.model
    }

    /// Get current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if a live handle is held
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Get current circuit state
    pub fn circuit_state(&self) -> CircuitState {
        self.executor.circuit_state()
    }

    /// Get circuit breaker metrics
    pub fn circuit_metrics(&self) -> CircuitMetrics {
        self.executor.circuit_metrics()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Connect to the queue manager
    pub async fn connect(&self) -> Result<(), QueueManagerError> {
        self.connect_with_cancellation(&CancellationToken::new()).await
    }

    /// Connect to the queue manager, giving up when `cancellation` fires.
    ///
    /// Does nothing if a live connection is already held.
    pub async fn connect_with_cancellation(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<(), QueueManagerError> {
        let mut slot = self.handle.lock().await;

        if slot.as_ref().is_some_and(|handle| handle.is_alive()) {
            debug!(queue_manager = %self.model.manager_name, "Already connected");
            return Ok(());
        }
        if let Some(stale) = slot.take() {
            stale.close();
        }

        self.set_state(ConnectionState::Connecting);
        let mut guard = ConnectingGuard {
            state: &self.state,
            armed: true,
        };

        info!(
            queue_manager = %self.model.manager_name,
            transport = self.transport.name(),
            "Connecting to queue manager"
        );

        let transport = &self.transport;
        let model = &self.model;
        let result = self
            .executor
            .execute("connect", cancellation, |attempt| {
                debug!(queue_manager = %model.manager_name, attempt, "Connect attempt");
                transport.connect(model)
            })
            .await;

        match result {
            Ok(handle) => {
                *slot = Some(handle);
                guard.armed = false;
                self.set_state(ConnectionState::Connected);
                info!(queue_manager = %self.model.manager_name, "Connected to queue manager");
                Ok(())
            }
            Err(error) => {
                warn!(
                    queue_manager = %self.model.manager_name,
                    error = %error,
                    "Failed to connect to queue manager"
                );
                Err(self.connection_error(error))
            }
        }
    }

    fn connection_error(&self, error: RetryError) -> QueueManagerError {
        let reason = match error {
            RetryError::CircuitOpen => FailureReason::CircuitOpen,
            RetryError::Exhausted { attempts, source } => {
                FailureReason::RetriesExhausted { attempts, source }
            }
            RetryError::Cancelled { .. } => {
                return QueueManagerError::Cancelled {
                    operation: "connect".to_string(),
                }
            }
        };

        QueueManagerError::Connection {
            manager: self.model.manager_name.to_string(),
            reason,
        }
    }

    /// Release the connection. Safe to call any number of times.
    pub async fn dispose(&self) {
        let mut slot = self.handle.lock().await;
        self.release(&mut slot);
    }

    /// Ask the live handle whether it is still usable.
    ///
    /// A dead handle is released; this never reconnects.
    pub async fn check_health(&self) -> bool {
        let mut slot = self.handle.lock().await;
        match slot.as_ref().map(|handle| handle.is_alive()) {
            Some(true) => true,
            Some(false) => {
                warn!(queue_manager = %self.model.manager_name, "Connection is no longer usable");
                self.release(&mut slot);
                false
            }
            None => false,
        }
    }

    /// Lock the handle slot for one queue operation
    pub(crate) async fn lock_handle(&self) -> MutexGuard<'_, HandleSlot> {
        self.handle.lock().await
    }

    /// Executor applying the retry policy to every call on this connection
    pub(crate) fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Close and drop the handle held in `slot`
    pub(crate) fn release(&self, slot: &mut HandleSlot) {
        if let Some(handle) = slot.take() {
            handle.close();
            info!(queue_manager = %self.model.manager_name, "Disconnected from queue manager");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("queue_manager", &self.model.manager_name)
            .field("transport", &self.transport.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.close();
            debug!(queue_manager = %self.model.manager_name, "Connection released on drop");
        }
    }
}

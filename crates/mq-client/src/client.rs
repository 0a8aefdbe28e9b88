//! Queue manager client: put and get operations on named queues.

use crate::circuit_breaker::{CircuitMetrics, CircuitState};
use crate::connection::{ConnectionManager, ConnectionState, HandleSlot};
use crate::error::{FailureReason, QueueManagerError, TransportError};
use crate::message::{CorrelationId, QueueMessage, QueueName, WireMessage};
use crate::model::QueueManagerModel;
use crate::retry::RetryError;
use crate::transport::QueueTransport;
use futures::stream::{self, Stream};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Queue operation, used to shape errors and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Put,
    Get,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Get => "get",
        }
    }

    fn failure(self, queue: &str, reason: FailureReason) -> QueueManagerError {
        let queue = queue.to_string();
        match self {
            Self::Put => QueueManagerError::Put { queue, reason },
            Self::Get => QueueManagerError::Get { queue, reason },
        }
    }
}

/// Client for one queue manager.
///
/// Every put and get runs under the model's retry policy and shares one
/// circuit breaker with `connect`.
#[derive(Debug)]
pub struct QueueManager {
    connection: ConnectionManager,
}

impl QueueManager {
    /// Create a disconnected client
    pub fn new(model: QueueManagerModel, transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            connection: ConnectionManager::new(model, transport),
        }
    }

    /// Create a client from a flat `QueueManager` section and its optional
    /// `RetryPolicy` sub-section
    pub fn from_sections(
        section: &HashMap<String, String>,
        retry_section: Option<&HashMap<String, String>>,
        transport: Arc<dyn QueueTransport>,
    ) -> Result<Self, QueueManagerError> {
        let model = QueueManagerModel::from_sections(section, retry_section)?;
        Ok(Self::new(model, transport))
    }

    /// Get the queue manager model
    pub fn model(&self) -> &QueueManagerModel {
        self.connection.model()
    }

    /// Get the underlying connection manager
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Get the connection lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Check whether a connection is currently held
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Get current circuit state
    pub fn circuit_state(&self) -> CircuitState {
        self.connection.circuit_state()
    }

    /// Get circuit breaker metrics
    pub fn circuit_metrics(&self) -> CircuitMetrics {
        self.connection.circuit_metrics()
    }

    /// Connect to the queue manager
    pub async fn connect(&self) -> Result<(), QueueManagerError> {
        self.connection.connect().await
    }

    /// Connect to the queue manager, giving up when `cancellation` fires
    pub async fn connect_with_cancellation(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<(), QueueManagerError> {
        self.connection.connect_with_cancellation(cancellation).await
    }

    /// Release the connection
    pub async fn dispose(&self) {
        self.connection.dispose().await
    }

    /// Check whether the live connection is still usable
    pub async fn check_health(&self) -> bool {
        self.connection.check_health().await
    }

    // ========================================================================
    // Put
    // ========================================================================

    /// Put a message on a queue and return the correlation ID it carries.
    pub async fn put_message(
        &self,
        queue_name: &str,
        message: QueueMessage,
    ) -> Result<CorrelationId, QueueManagerError> {
        self.put_message_with_cancellation(queue_name, message, &CancellationToken::new())
            .await
    }

    /// Put a message on a queue, giving up when `cancellation` fires.
    ///
    /// A correlation ID is generated when the message carries none. Each
    /// attempt is bounded by the model's message timeout; an attempt that
    /// timed out may still have been delivered.
    pub async fn put_message_with_cancellation(
        &self,
        queue_name: &str,
        message: QueueMessage,
        cancellation: &CancellationToken,
    ) -> Result<CorrelationId, QueueManagerError> {
        let operation = Operation::Put;
        let mut slot = self.connection.lock_handle().await;
        let Some(handle) = slot.as_deref() else {
            return Err(operation.failure(queue_name, FailureReason::NotConnected));
        };
        let queue = parse_queue_name(operation, queue_name)?;

        let model = self.model();
        let correlation_id = message.correlation_id.unwrap_or_default();
        let payload = model
            .message_encoding
            .encode(&message.content, model.use_encoding_lead_bytes);
        let wire = WireMessage::new(correlation_id, payload);
        let timeout = model.message_timeout();

        let result = self
            .connection
            .executor()
            .execute(operation.name(), cancellation, |attempt| {
                debug!(
                    queue = %queue,
                    correlation_id = %correlation_id,
                    attempt,
                    "Putting message"
                );
                let put = handle.put(&queue, &wire);
                async move {
                    if timeout.is_zero() {
                        return put.await;
                    }
                    tokio::time::timeout(timeout, put)
                        .await
                        .unwrap_or(Err(TransportError::Timeout { duration: timeout }))
                }
            })
            .await;

        match result {
            Ok(()) => {
                debug!(
                    queue_manager = %model.manager_name,
                    queue = %queue,
                    correlation_id = %correlation_id,
                    bytes = wire.len(),
                    "Message put"
                );
                Ok(correlation_id)
            }
            Err(error) => Err(self.operation_error(&mut slot, operation, queue_name, error)),
        }
    }

    // ========================================================================
    // Get
    // ========================================================================

    /// Get one message from a queue, or `None` if the queue stays empty for
    /// the message timeout.
    pub async fn receive_message(
        &self,
        queue_name: &str,
    ) -> Result<Option<QueueMessage>, QueueManagerError> {
        self.receive_message_with_cancellation(queue_name, &CancellationToken::new())
            .await
    }

    /// Get one message from a queue, giving up when `cancellation` fires.
    pub async fn receive_message_with_cancellation(
        &self,
        queue_name: &str,
        cancellation: &CancellationToken,
    ) -> Result<Option<QueueMessage>, QueueManagerError> {
        let operation = Operation::Get;
        let mut slot = self.connection.lock_handle().await;
        let Some(handle) = slot.as_deref() else {
            return Err(operation.failure(queue_name, FailureReason::NotConnected));
        };
        let queue = parse_queue_name(operation, queue_name)?;

        let model = self.model();
        let wait = model.message_timeout();

        let result = self
            .connection
            .executor()
            .execute(operation.name(), cancellation, |attempt| {
                debug!(queue = %queue, attempt, "Getting message");
                let get = handle.get(&queue, wait);
                async move {
                    if wait.is_zero() {
                        return get.await;
                    }
                    // Timing out is the queue staying empty, not a failure
                    tokio::time::timeout(wait, get).await.unwrap_or(Ok(None))
                }
            })
            .await;

        let wire = match result {
            Ok(Some(wire)) => wire,
            Ok(None) => return Ok(None),
            Err(error) => {
                return Err(self.operation_error(&mut slot, operation, queue_name, error))
            }
        };

        let content = model
            .message_encoding
            .decode(&wire.payload, model.use_encoding_lead_bytes)
            .map_err(|e| operation.failure(queue_name, FailureReason::Encoding(e)))?;

        debug!(
            queue_manager = %model.manager_name,
            queue = %queue,
            correlation_id = %wire.correlation_id,
            bytes = wire.len(),
            "Message received"
        );

        Ok(Some(QueueMessage {
            content,
            correlation_id: Some(wire.correlation_id),
        }))
    }

    /// Drain a queue as a lazy stream of message contents.
    ///
    /// The stream ends once the queue is observed empty. A failure is yielded
    /// as one error item and ends the stream. Calling this again starts a
    /// fresh drain.
    pub fn get_messages<'a>(
        &'a self,
        queue_name: &str,
    ) -> impl Stream<Item = Result<String, QueueManagerError>> + 'a {
        self.get_messages_with_cancellation(queue_name, CancellationToken::new())
    }

    /// Drain a queue as a lazy stream, ending early when `cancellation` fires.
    pub fn get_messages_with_cancellation<'a>(
        &'a self,
        queue_name: &str,
        cancellation: CancellationToken,
    ) -> impl Stream<Item = Result<String, QueueManagerError>> + 'a {
        let queue_name = queue_name.to_string();

        stream::unfold(Some((queue_name, cancellation)), move |next| async move {
            let (queue_name, cancellation) = next?;
            match self
                .receive_message_with_cancellation(&queue_name, &cancellation)
                .await
            {
                Ok(Some(message)) => Some((Ok(message.content), Some((queue_name, cancellation)))),
                Ok(None) => {
                    debug!(queue = %queue_name, "Queue drained");
                    None
                }
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    /// Map a failed retry-wrapped call to the caller-facing error.
    ///
    /// A broken connection is released so the caller must reconnect.
    fn operation_error(
        &self,
        slot: &mut HandleSlot,
        operation: Operation,
        queue_name: &str,
        error: RetryError,
    ) -> QueueManagerError {
        warn!(
            queue_manager = %self.model().manager_name,
            queue = queue_name,
            operation = operation.name(),
            error = %error,
            "Queue operation failed"
        );

        let reason = match error {
            RetryError::CircuitOpen => FailureReason::CircuitOpen,
            RetryError::Exhausted { attempts, source } => {
                if source.is_connection_loss() {
                    self.connection.release(slot);
                }
                FailureReason::RetriesExhausted { attempts, source }
            }
            RetryError::Cancelled { .. } => {
                return QueueManagerError::Cancelled {
                    operation: operation.name().to_string(),
                }
            }
        };

        operation.failure(queue_name, reason)
    }
}

fn parse_queue_name(operation: Operation, queue_name: &str) -> Result<QueueName, QueueManagerError> {
    QueueName::new(queue_name.to_string())
        .map_err(|e| operation.failure(queue_name, FailureReason::InvalidQueueName(e)))
}

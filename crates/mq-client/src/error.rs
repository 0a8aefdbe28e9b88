//! Error types for queue manager operations.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the queue manager client.
#[derive(Debug, Error)]
pub enum QueueManagerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to connect to queue manager '{manager}': {reason}")]
    Connection {
        manager: String,
        #[source]
        reason: FailureReason,
    },

    #[error("Failed to put message to queue '{queue}': {reason}")]
    Put {
        queue: String,
        #[source]
        reason: FailureReason,
    },

    #[error("Failed to get message from queue '{queue}': {reason}")]
    Get {
        queue: String,
        #[source]
        reason: FailureReason,
    },

    #[error("Operation '{operation}' was cancelled")]
    Cancelled { operation: String },
}

impl QueueManagerError {
    /// Check if the failure was caused by the circuit breaker rejecting the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(
            self,
            Self::Connection {
                reason: FailureReason::CircuitOpen,
                ..
            } | Self::Put {
                reason: FailureReason::CircuitOpen,
                ..
            } | Self::Get {
                reason: FailureReason::CircuitOpen,
                ..
            }
        )
    }

    /// Get the failure reason for connection, put and get errors
    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Connection { reason, .. } | Self::Put { reason, .. } | Self::Get { reason, .. } => {
                Some(reason)
            }
            Self::Configuration(_) | Self::Cancelled { .. } => None,
        }
    }
}

/// Why a connect, put or get operation failed
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("not connected to the queue manager")]
    NotConnected,

    #[error("invalid queue name: {0}")]
    InvalidQueueName(#[source] ValidationError),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] EncodingError),
}

/// Errors reported by a queue transport for a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Queue manager '{manager}' is not available")]
    QueueManagerUnavailable { manager: String },

    #[error("Queue manager name '{manager}' is not known to the transport")]
    UnknownQueueManager { manager: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue '{queue_name}' is full (max depth {max_depth})")]
    QueueFull { queue_name: String, max_depth: usize },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Not authorized for operation: {operation}")]
    NotAuthorized { operation: String },

    #[error("Connection to the queue manager is broken")]
    ConnectionBroken,

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Transport error ({code}): {message}")]
    Provider { code: String, message: String },
}

impl TransportError {
    /// Check if the failure may clear without caller action
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueManagerUnavailable { .. } => true,
            Self::UnknownQueueManager { .. } => false,
            Self::QueueNotFound { .. } => false,
            Self::QueueFull { .. } => true,
            Self::MessageTooLarge { .. } => false,
            Self::NotAuthorized { .. } => false,
            Self::ConnectionBroken => false,
            Self::Timeout { .. } => true,
            Self::Provider { .. } => true,
        }
    }

    /// Check if the live connection can no longer be used
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionBroken)
    }
}

/// Errors converting between message content and wire payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Payload is not valid UTF-8: {message}")]
    InvalidUtf8 { message: String },

    #[error("Payload is not valid UTF-16: {message}")]
    InvalidUtf16 { message: String },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid configuration for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },
}

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

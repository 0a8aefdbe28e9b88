//! # MQ Client
//!
//! Resilient client for message-queuing transports.
//!
//! This library provides:
//! - Managed connections to a named queue manager
//! - Put and lazy drain-style get operations on named queues
//! - Fixed-delay retries and a circuit breaker around every transport call
//! - UTF-8, UTF-16 and passthrough payload encodings with optional lead bytes
//! - Correlation IDs generated for messages that carry none
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all client operations
//! - [`message`] - Names, correlation IDs and message structures
//! - [`encoding`] - Payload encodings
//! - [`model`] - Queue manager model and retry policy
//! - [`circuit_breaker`] / [`retry`] - Resilience policy
//! - [`transport`] - Traits implemented by concrete transports
//! - [`transports`] - Transport implementations
//! - [`connection`] / [`client`] - Connection lifecycle and queue operations
//! - [`settings`] / [`logging`] - Settings loading and logging setup
//!
//! ## Example
//!
//! ```
//! use futures::StreamExt;
//! use mq_client::{
//!     InMemoryBroker, InMemoryConfig, InMemoryTransport, QueueManager, QueueManagerModel,
//!     QueueMessage,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let model = QueueManagerModel::new("QM1")?;
//! let broker = InMemoryBroker::new(model.manager_name.clone(), InMemoryConfig::default());
//! let client = QueueManager::new(model, Arc::new(InMemoryTransport::new(broker)));
//!
//! client.connect().await?;
//! client.put_message("DEV.QUEUE.1", QueueMessage::new("hello")).await?;
//!
//! let messages: Vec<_> = client.get_messages("DEV.QUEUE.1").collect().await;
//! assert_eq!(messages.len(), 1);
//!
//! client.dispose().await;
//! # Ok::<(), mq_client::QueueManagerError>(())
//! # }).unwrap();
//! ```

// Module declarations
pub mod circuit_breaker;
pub mod client;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod message;
pub mod model;
pub mod retry;
pub mod settings;
pub mod transport;
pub mod transports;

// Re-export commonly used types at crate root for convenience
pub use circuit_breaker::{CircuitMetrics, CircuitState};
pub use client::QueueManager;
pub use connection::{ConnectionManager, ConnectionState};
pub use encoding::MessageEncoding;
pub use error::{
    ConfigurationError, EncodingError, FailureReason, QueueManagerError, TransportError,
    ValidationError,
};
pub use logging::{init_logging, LoggingConfig};
pub use message::{CorrelationId, QueueManagerName, QueueMessage, QueueName, WireMessage};
pub use model::{QueueManagerModel, QueueRetryPolicy};
pub use settings::ClientSettings;
pub use tokio_util::sync::CancellationToken;
pub use transport::{QueueConnection, QueueTransport};
pub use transports::{InMemoryBroker, InMemoryConfig, InMemoryTransport};

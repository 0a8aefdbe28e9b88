//! Transport traits implemented by concrete queue transports.
//!
//! A [`QueueTransport`] opens connections to a queue manager; each
//! [`QueueConnection`] is a live handle used for put and get calls. The
//! client never assumes a handle is safe for concurrent use and serialises
//! every call on it.

use crate::error::TransportError;
use crate::message::{QueueName, WireMessage};
use crate::model::QueueManagerModel;
use async_trait::async_trait;
use std::time::Duration;

/// Interface implemented by specific transports to open connections
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Connect to the queue manager described by `model`.
    ///
    /// Transport-specific options are read from `model.settings`.
    async fn connect(
        &self,
        model: &QueueManagerModel,
    ) -> Result<Box<dyn QueueConnection>, TransportError>;

    /// Short transport name used in logs
    fn name(&self) -> &str;
}

/// A live connection to one queue manager
#[async_trait]
pub trait QueueConnection: Send + Sync {
    /// Put one message on a queue
    async fn put(&self, queue: &QueueName, message: &WireMessage) -> Result<(), TransportError>;

    /// Get one message, waiting up to `wait` for one to arrive.
    ///
    /// Returns `Ok(None)` when the queue stays empty for the whole wait.
    async fn get(
        &self,
        queue: &QueueName,
        wait: Duration,
    ) -> Result<Option<WireMessage>, TransportError>;

    /// Check whether the handle is still usable
    fn is_alive(&self) -> bool;

    /// Release the handle; later calls fail with `ConnectionBroken`
    fn close(&self);
}

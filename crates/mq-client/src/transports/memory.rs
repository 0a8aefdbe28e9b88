//! In-memory queue transport implementation for testing and development.
//!
//! This module provides a fully functional in-process queue manager that:
//! - Stores messages per queue in FIFO order
//! - Enforces queue depth and message length limits
//! - Wakes waiting receivers when messages arrive
//! - Can simulate outages and broken connections
//!
//! This transport is intended for:
//! - Unit and integration testing of queue manager clients
//! - Development without a running queue manager
//! - Reference implementation for networked transports

use crate::error::TransportError;
use crate::message::{QueueManagerName, QueueName, WireMessage};
use crate::model::QueueManagerModel;
use crate::transport::{QueueConnection, QueueTransport};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// In-memory transport configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    pub max_queue_depth: usize,
    pub max_message_length: usize,
    /// Create queues on first put instead of requiring `define_queue`
    pub auto_define_queues: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 5000,
            max_message_length: 4 * 1024 * 1024, // 4MB
            auto_define_queues: true,
        }
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Mutable broker state
struct BrokerState {
    queues: HashMap<QueueName, VecDeque<WireMessage>>,
    available: bool,
    /// Bumped to invalidate every open connection
    generation: u64,
}

/// Shared in-process queue manager backing any number of connections
pub struct InMemoryBroker {
    manager_name: QueueManagerName,
    config: InMemoryConfig,
    state: Mutex<BrokerState>,
    arrivals: Notify,
    connections_opened: AtomicU64,
}

impl InMemoryBroker {
    /// Create new broker for a queue manager name
    pub fn new(manager_name: QueueManagerName, config: InMemoryConfig) -> Arc<Self> {
        Arc::new(Self {
            manager_name,
            config,
            state: Mutex::new(BrokerState {
                queues: HashMap::new(),
                available: true,
                generation: 0,
            }),
            arrivals: Notify::new(),
            connections_opened: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the queue manager this broker answers to
    pub fn manager_name(&self) -> &QueueManagerName {
        &self.manager_name
    }

    /// Define an empty queue (no-op if it already exists)
    pub fn define_queue(&self, queue: QueueName) {
        self.lock().queues.entry(queue).or_default();
    }

    /// Current number of messages on a queue, if it exists
    pub fn queue_depth(&self, queue: &QueueName) -> Option<usize> {
        self.lock().queues.get(queue).map(VecDeque::len)
    }

    /// Copy of the messages on a queue without removing them
    pub fn browse(&self, queue: &QueueName) -> Vec<WireMessage> {
        self.lock()
            .queues
            .get(queue)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Simulate the queue manager going down or coming back
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Invalidate every open connection
    pub fn break_connections(&self) {
        self.lock().generation += 1;
    }

    /// Number of successful connects so far
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::SeqCst)
    }

    fn put(&self, queue: &QueueName, message: &WireMessage) -> Result<(), TransportError> {
        if message.len() > self.config.max_message_length {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                max_size: self.config.max_message_length,
            });
        }

        {
            let mut state = self.lock();
            let auto_define = self.config.auto_define_queues;
            let messages = match state.queues.get_mut(queue) {
                Some(messages) => messages,
                None if auto_define => state.queues.entry(queue.clone()).or_default(),
                None => {
                    return Err(TransportError::QueueNotFound {
                        queue_name: queue.to_string(),
                    })
                }
            };

            if messages.len() >= self.config.max_queue_depth {
                return Err(TransportError::QueueFull {
                    queue_name: queue.to_string(),
                    max_depth: self.config.max_queue_depth,
                });
            }

            messages.push_back(message.clone());
        }

        self.arrivals.notify_waiters();
        Ok(())
    }

    fn try_get(&self, queue: &QueueName) -> Result<Option<WireMessage>, TransportError> {
        let mut state = self.lock();
        match state.queues.get_mut(queue) {
            Some(messages) => Ok(messages.pop_front()),
            None if self.config.auto_define_queues => Ok(None),
            None => Err(TransportError::QueueNotFound {
                queue_name: queue.to_string(),
            }),
        }
    }
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// Transport opening connections to an [`InMemoryBroker`]
#[derive(Clone)]
pub struct InMemoryTransport {
    broker: Arc<InMemoryBroker>,
}

impl InMemoryTransport {
    /// Create new transport for a broker
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self { broker }
    }

    /// Get the broker behind this transport
    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn connect(
        &self,
        model: &QueueManagerModel,
    ) -> Result<Box<dyn QueueConnection>, TransportError> {
        let generation = {
            let state = self.broker.lock();
            if !state.available {
                return Err(TransportError::QueueManagerUnavailable {
                    manager: model.manager_name.to_string(),
                });
            }
            state.generation
        };

        if model.manager_name != self.broker.manager_name {
            return Err(TransportError::UnknownQueueManager {
                manager: model.manager_name.to_string(),
            });
        }

        self.broker.connections_opened.fetch_add(1, Ordering::SeqCst);
        debug!(queue_manager = %model.manager_name, "In-memory connection opened");

        Ok(Box::new(InMemoryConnection {
            broker: Arc::clone(&self.broker),
            generation,
            closed: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ============================================================================
// InMemoryConnection
// ============================================================================

/// Live handle onto an [`InMemoryBroker`]
pub struct InMemoryConnection {
    broker: Arc<InMemoryBroker>,
    generation: u64,
    closed: AtomicBool,
}

impl InMemoryConnection {
    /// Fail unless the handle is open and the broker reachable
    fn ensure_usable(&self) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::ConnectionBroken);
        }
        if !self.broker.lock().available {
            return Err(TransportError::QueueManagerUnavailable {
                manager: self.broker.manager_name.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QueueConnection for InMemoryConnection {
    async fn put(&self, queue: &QueueName, message: &WireMessage) -> Result<(), TransportError> {
        self.ensure_usable()?;
        self.broker.put(queue, message)
    }

    async fn get(
        &self,
        queue: &QueueName,
        wait: Duration,
    ) -> Result<Option<WireMessage>, TransportError> {
        let deadline = Instant::now() + wait;

        loop {
            self.ensure_usable()?;

            // Register interest before checking so a concurrent put is not missed
            let arrived = self.broker.arrivals.notified();
            if let Some(message) = self.broker.try_get(queue)? {
                return Ok(Some(message));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            if tokio::time::timeout(remaining, arrived).await.is_err() {
                return Ok(None);
            }
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.broker.lock().generation == self.generation
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

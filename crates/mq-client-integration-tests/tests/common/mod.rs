//! Common test utilities for mq-client integration tests
//!
//! This module provides:
//! - A transport wrapper injecting scripted failures into the in-memory broker
//! - Helper functions for creating connected clients

use async_trait::async_trait;
use mq_client::{
    InMemoryBroker, InMemoryConfig, InMemoryTransport, QueueConnection, QueueManager,
    QueueManagerModel, QueueName, QueueTransport, TransportError, WireMessage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Flaky Transport
// ============================================================================

/// Shared failure script and call counters
#[derive(Default)]
pub struct FailureScript {
    put_failures: Mutex<VecDeque<TransportError>>,
    put_calls: AtomicU32,
    get_calls: AtomicU32,
}

impl FailureScript {
    /// Queue errors returned by the next puts, in order
    pub fn fail_next_puts(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.put_failures.lock().unwrap().extend(errors);
    }

    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }
}

/// In-memory transport whose connections consult a failure script
#[derive(Clone)]
pub struct FlakyTransport {
    inner: InMemoryTransport,
    script: Arc<FailureScript>,
}

#[async_trait]
impl QueueTransport for FlakyTransport {
    async fn connect(
        &self,
        model: &QueueManagerModel,
    ) -> Result<Box<dyn QueueConnection>, TransportError> {
        let inner = self.inner.connect(model).await?;
        Ok(Box::new(FlakyConnection {
            inner,
            script: Arc::clone(&self.script),
        }))
    }

    fn name(&self) -> &str {
        "flaky-in-memory"
    }
}

struct FlakyConnection {
    inner: Box<dyn QueueConnection>,
    script: Arc<FailureScript>,
}

#[async_trait]
impl QueueConnection for FlakyConnection {
    async fn put(&self, queue: &QueueName, message: &WireMessage) -> Result<(), TransportError> {
        self.script.put_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.put_failures.lock().unwrap().pop_front();
        match scripted {
            Some(error) => Err(error),
            None => self.inner.put(queue, message).await,
        }
    }

    async fn get(
        &self,
        queue: &QueueName,
        wait: Duration,
    ) -> Result<Option<WireMessage>, TransportError> {
        self.script.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(queue, wait).await
    }

    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    fn close(&self) {
        self.inner.close()
    }
}

// ============================================================================
// Test Fixtures
// ============================================================================

/// Client wired to an in-memory broker through a flaky transport
pub struct TestFixture {
    pub client: QueueManager,
    pub broker: Arc<InMemoryBroker>,
    pub script: Arc<FailureScript>,
}

/// Create a disconnected client for `model`
pub fn create_fixture(model: QueueManagerModel) -> TestFixture {
    let broker = InMemoryBroker::new(model.manager_name.clone(), InMemoryConfig::default());
    let script = Arc::new(FailureScript::default());
    let transport = FlakyTransport {
        inner: InMemoryTransport::new(Arc::clone(&broker)),
        script: Arc::clone(&script),
    };

    TestFixture {
        client: QueueManager::new(model, Arc::new(transport)),
        broker,
        script,
    }
}

/// Create a client for `model` and connect it
pub async fn connected_fixture(model: QueueManagerModel) -> TestFixture {
    let fixture = create_fixture(model);
    fixture
        .client
        .connect()
        .await
        .expect("in-memory connect should succeed");
    fixture
}

pub fn queue(name: &str) -> QueueName {
    QueueName::new(name.to_string()).expect("valid queue name")
}

pub fn unavailable() -> TransportError {
    TransportError::QueueManagerUnavailable {
        manager: "QM1".to_string(),
    }
}

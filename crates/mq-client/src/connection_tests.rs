//! Tests for the connection manager lifecycle.

use super::*;
use crate::error::TransportError;
use crate::message::{QueueName, WireMessage};
use crate::model::QueueRetryPolicy;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

// ============================================================================
// Scripted Transport
// ============================================================================

/// Transport that fails connects with queued errors, then succeeds.
#[derive(Clone)]
struct ScriptedTransport {
    connect_calls: Arc<AtomicU32>,
    failures: Arc<StdMutex<VecDeque<TransportError>>>,
    closes: Arc<AtomicU32>,
    alive: Arc<AtomicBool>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            connect_calls: Arc::new(AtomicU32::new(0)),
            failures: Arc::new(StdMutex::new(VecDeque::new())),
            closes: Arc::new(AtomicU32::new(0)),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    fn failing_with(errors: impl IntoIterator<Item = TransportError>) -> Self {
        let transport = Self::new();
        transport.failures.lock().unwrap().extend(errors);
        transport
    }

    fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for ScriptedTransport {
    async fn connect(
        &self,
        _model: &QueueManagerModel,
    ) -> Result<Box<dyn QueueConnection>, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(Box::new(ScriptedConnection {
            alive: Arc::clone(&self.alive),
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closes),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedConnection {
    alive: Arc<AtomicBool>,
    closed: AtomicBool,
    closes: Arc<AtomicU32>,
}

#[async_trait]
impl QueueConnection for ScriptedConnection {
    async fn put(&self, _queue: &QueueName, _message: &WireMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn get(
        &self,
        _queue: &QueueName,
        _wait: Duration,
    ) -> Result<Option<WireMessage>, TransportError> {
        Ok(None)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn unavailable() -> TransportError {
    TransportError::QueueManagerUnavailable {
        manager: "QM1".to_string(),
    }
}

fn create_manager(transport: &ScriptedTransport, policy: QueueRetryPolicy) -> ConnectionManager {
    let model = QueueManagerModel::new("QM1").unwrap().with_retry_policy(policy);
    ConnectionManager::new(model, Arc::new(transport.clone()))
}

// ============================================================================
// Connect Tests
// ============================================================================

mod connect_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_leaves_manager_connected() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect().await.unwrap();

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected());
        assert_eq!(transport.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();

        assert_eq!(transport.connect_calls(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_unknown_manager_uses_every_attempt() {
        let transport = ScriptedTransport::failing_with(
            std::iter::repeat_with(|| TransportError::UnknownQueueManager {
                manager: "QM1".to_string(),
            })
            .take(4),
        );
        let manager = create_manager(&transport, QueueRetryPolicy::new(0, 3, 0, 0));

        let error = manager.connect().await.unwrap_err();

        assert!(matches!(
            error,
            QueueManagerError::Connection {
                reason: FailureReason::RetriesExhausted {
                    attempts: 4,
                    source: TransportError::UnknownQueueManager { .. }
                },
                ..
            }
        ));
        assert_eq!(transport.connect_calls(), 4);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_retries() {
        let transport = ScriptedTransport::failing_with(std::iter::repeat_with(unavailable).take(10));
        let manager = create_manager(&transport, QueueRetryPolicy::new(1, 2, 0, 0));

        let error = manager.connect().await.unwrap_err();

        match error {
            QueueManagerError::Connection { manager, reason } => {
                assert_eq!(manager, "QM1");
                assert!(matches!(reason, FailureReason::RetriesExhausted { attempts: 3, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.connect_calls(), 3);
        assert!(!manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_recovers_after_one_failure() {
        let transport = ScriptedTransport::failing_with([unavailable()]);
        let manager = create_manager(&transport, QueueRetryPolicy::new(1, 2, 3, 5));

        manager.connect().await.unwrap();

        assert_eq!(transport.connect_calls(), 2);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_rejects_connect_without_transport_call() {
        let transport = ScriptedTransport::failing_with(std::iter::repeat_with(unavailable).take(10));
        let manager = create_manager(&transport, QueueRetryPolicy::new(0, 0, 2, 60));

        assert!(manager.connect().await.is_err());
        assert!(manager.connect().await.is_err());
        assert_eq!(manager.circuit_state(), CircuitState::Open);

        let error = manager.connect().await.unwrap_err();

        assert!(error.is_circuit_open());
        assert_eq!(transport.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_connect() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        let token = CancellationToken::new();
        token.cancel();

        let error = manager.connect_with_cancellation(&token).await.unwrap_err();

        assert!(matches!(error, QueueManagerError::Cancelled { operation } if operation == "connect"));
        assert_eq!(transport.connect_calls(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}

// ============================================================================
// Dispose Tests
// ============================================================================

mod dispose_tests {
    use super::*;

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        manager.connect().await.unwrap();

        manager.dispose().await;
        manager.dispose().await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_dispose_without_connect() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());

        manager.dispose().await;

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.closes(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_handle() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        manager.connect().await.unwrap();

        drop(manager);

        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_after_dispose() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());

        manager.connect().await.unwrap();
        manager.dispose().await;
        manager.connect().await.unwrap();

        assert!(manager.is_connected());
        assert_eq!(transport.connect_calls(), 2);
    }
}

// ============================================================================
// Health Check Tests
// ============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_connection() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        manager.connect().await.unwrap();

        assert!(manager.check_health().await);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_not_connected_is_unhealthy() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());

        assert!(!manager.check_health().await);
        assert_eq!(transport.connect_calls(), 0);
    }

    /// A dead handle is released and never replaced automatically.
    #[tokio::test]
    async fn test_dead_handle_is_released_without_reconnect() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        manager.connect().await.unwrap();

        transport.alive.store(false, Ordering::SeqCst);

        assert!(!manager.check_health().await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.closes(), 1);
        assert_eq!(transport.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_replaces_dead_handle() {
        let transport = ScriptedTransport::new();
        let manager = create_manager(&transport, QueueRetryPolicy::default());
        manager.connect().await.unwrap();

        transport.alive.store(false, Ordering::SeqCst);
        let _ = manager.connect().await;
        transport.alive.store(true, Ordering::SeqCst);

        assert_eq!(transport.connect_calls(), 2);
        assert_eq!(transport.closes(), 1);
        assert!(manager.check_health().await);
    }
}

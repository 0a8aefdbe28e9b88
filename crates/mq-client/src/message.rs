//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of queue and queue manager object names
pub const MAX_OBJECT_NAME_LENGTH: usize = 48;

/// Length of a correlation identifier in bytes
pub const CORRELATION_ID_LENGTH: usize = 16;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validate an object name against the queue manager naming rules.
///
/// Names are 1-48 characters of ASCII alphanumerics, `.`, `_`, `/` and `%`.
fn validate_object_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > MAX_OBJECT_NAME_LENGTH {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("must be 1-{} characters", MAX_OBJECT_NAME_LENGTH),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '%'))
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: "only ASCII alphanumeric, '.', '_', '/' and '%' allowed".to_string(),
        });
    }

    Ok(())
}

/// Validated queue name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        validate_object_name("queue_name", &name)?;
        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

/// Validated name of the queue manager to connect to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueManagerName(String);

impl QueueManagerName {
    /// Create new queue manager name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        validate_object_name("queue_manager_name", &name)?;
        Ok(Self(name))
    }

    /// Get queue manager name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueManagerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueManagerName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueManagerName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueManagerName> for String {
    fn from(value: QueueManagerName) -> Self {
        value.0
    }
}

/// 16-byte identifier correlating related messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId([u8; CORRELATION_ID_LENGTH]);

impl CorrelationId {
    /// Generate new random correlation ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Create correlation ID from raw bytes, which must be exactly 16 long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let raw: [u8; CORRELATION_ID_LENGTH] =
            bytes.try_into().map_err(|_| ValidationError::OutOfRange {
                field: "correlation_id".to_string(),
                message: format!(
                    "must be exactly {} bytes, got {}",
                    CORRELATION_ID_LENGTH,
                    bytes.len()
                ),
            })?;
        Ok(Self(raw))
    }

    /// Get raw correlation ID bytes
    pub fn as_bytes(&self) -> &[u8; CORRELATION_ID_LENGTH] {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; CORRELATION_ID_LENGTH]> for CorrelationId {
    fn from(value: [u8; CORRELATION_ID_LENGTH]) -> Self {
        Self(value)
    }
}

impl From<uuid::Uuid> for CorrelationId {
    fn from(value: uuid::Uuid) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for CorrelationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ValidationError::InvalidFormat {
            field: "correlation_id".to_string(),
            message: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }
}

/// Unique identifier assigned to each message put on a queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to send to, or received from, a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub content: String,
    pub correlation_id: Option<CorrelationId>,
}

impl QueueMessage {
    /// Create new message with content and no correlation ID
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            correlation_id: None,
        }
    }

    /// Add correlation ID for request/response tracking
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// A message as handed to and returned by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub message_id: MessageId,
    pub correlation_id: CorrelationId,
    pub payload: Bytes,
    pub put_at: DateTime<Utc>,
}

impl WireMessage {
    /// Create wire message for an encoded payload
    pub fn new(correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            message_id: MessageId::new(),
            correlation_id,
            payload,
            put_at: Utc::now(),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

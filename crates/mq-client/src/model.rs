//! Queue manager configuration model.
//!
//! [`QueueManagerModel`] identifies one queue manager and carries everything
//! the client needs to talk to it. It can be built directly, or translated
//! from the flat key/value `QueueManager` section (and optional `RetryPolicy`
//! sub-section) with [`QueueManagerModel::from_sections`].

use crate::encoding::MessageEncoding;
use crate::error::ConfigurationError;
use crate::message::QueueManagerName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Configuration Keys
// ============================================================================

pub const QUEUE_MANAGER_NAME_KEY: &str = "QUEUE_MANAGER_NAME";
pub const MESSAGE_ENCODING_KEY: &str = "MESSAGE_ENCODING";
/// Timeout key as spelled by existing deployments
pub const MESSAGE_TIMEOUT_KEY: &str = "MESSAGE_TIMOUT_IN_MS";
pub const MESSAGE_TIMEOUT_KEY_ALT: &str = "MESSAGE_TIMEOUT_IN_MS";
pub const USE_ENCODING_LEAD_BYTES_KEY: &str = "USE_ENCODING_LEADING_BYTES";

pub const WAIT_AND_RETRY_SECONDS_KEY: &str = "WaitAndRetrySeconds";
pub const RETRY_COUNT_KEY: &str = "RetryCount";
pub const CIRCUIT_BREAKER_ALLOWED_COUNT_KEY: &str = "CircuitBreakerExceptionAllowedCount";
/// Circuit breaker timeout key as spelled by existing deployments
pub const CIRCUIT_BREAKER_TIMEOUT_KEY: &str = "CircutBreakerTimeoutSeconds";
pub const CIRCUIT_BREAKER_TIMEOUT_KEY_ALT: &str = "CircuitBreakerTimeoutSeconds";

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry and circuit breaker settings for transport calls.
///
/// The zero-valued default attempts each call once and never opens the
/// circuit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRetryPolicy {
    /// Delay between retry attempts (seconds)
    pub wait_and_retry_seconds: u32,

    /// Retries after the first attempt
    pub retry_count: u32,

    /// Consecutive failed calls that open the circuit (0 = never)
    pub circuit_breaker_exception_allowed_count: u32,

    /// Time the circuit stays open before a trial call (seconds)
    #[serde(alias = "circut_breaker_timeout_seconds")]
    pub circuit_breaker_timeout_seconds: u32,
}

impl QueueRetryPolicy {
    /// Create a new retry policy
    pub fn new(
        wait_and_retry_seconds: u32,
        retry_count: u32,
        circuit_breaker_exception_allowed_count: u32,
        circuit_breaker_timeout_seconds: u32,
    ) -> Self {
        Self {
            wait_and_retry_seconds,
            retry_count,
            circuit_breaker_exception_allowed_count,
            circuit_breaker_timeout_seconds,
        }
    }

    /// Translate the `RetryPolicy` section.
    ///
    /// A missing or empty section yields the zero-valued policy. Once the
    /// section has entries, all four values are required.
    pub fn from_section(
        section: Option<&HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let section = match section {
            Some(section) if !section.is_empty() => section,
            _ => return Ok(Self::default()),
        };

        Ok(Self {
            wait_and_retry_seconds: required_u32(section, &[WAIT_AND_RETRY_SECONDS_KEY])?,
            retry_count: required_u32(section, &[RETRY_COUNT_KEY])?,
            circuit_breaker_exception_allowed_count: required_u32(
                section,
                &[CIRCUIT_BREAKER_ALLOWED_COUNT_KEY],
            )?,
            circuit_breaker_timeout_seconds: required_u32(
                section,
                &[CIRCUIT_BREAKER_TIMEOUT_KEY, CIRCUIT_BREAKER_TIMEOUT_KEY_ALT],
            )?,
        })
    }

    /// Total attempts per call (initial + retries)
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Delay between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.wait_and_retry_seconds))
    }

    /// Time the circuit stays open
    pub fn circuit_open_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.circuit_breaker_timeout_seconds))
    }

    /// Check if the circuit breaker can ever open
    pub fn circuit_breaker_enabled(&self) -> bool {
        self.circuit_breaker_exception_allowed_count > 0
    }
}

// ============================================================================
// Queue Manager Model
// ============================================================================

/// Identifies and configures one queue manager connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueManagerModel {
    pub manager_name: QueueManagerName,
    pub message_encoding: MessageEncoding,
    pub message_timeout_ms: u32,
    pub use_encoding_lead_bytes: bool,
    /// Raw passthrough settings for transport-specific options
    pub settings: HashMap<String, String>,
    pub retry_policy: QueueRetryPolicy,
}

impl QueueManagerModel {
    /// Create model for a queue manager with default options
    pub fn new(manager_name: &str) -> Result<Self, ConfigurationError> {
        let manager_name = QueueManagerName::new(manager_name.to_string()).map_err(|e| {
            ConfigurationError::Invalid {
                key: QUEUE_MANAGER_NAME_KEY.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            manager_name,
            message_encoding: MessageEncoding::default(),
            message_timeout_ms: 0,
            use_encoding_lead_bytes: false,
            settings: HashMap::new(),
            retry_policy: QueueRetryPolicy::default(),
        })
    }

    /// Translate the flat `QueueManager` section and its optional
    /// `RetryPolicy` sub-section.
    ///
    /// Keys are matched case-insensitively. The whole section is kept as
    /// passthrough `settings`.
    pub fn from_sections(
        section: &HashMap<String, String>,
        retry_section: Option<&HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let manager_name = lookup(section, &[QUEUE_MANAGER_NAME_KEY])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConfigurationError::Missing {
                key: QUEUE_MANAGER_NAME_KEY.to_string(),
            })?;

        let mut model = Self::new(manager_name)?;
        model.message_encoding = lookup(section, &[MESSAGE_ENCODING_KEY])
            .map(MessageEncoding::from_config)
            .unwrap_or_default();
        model.message_timeout_ms =
            required_u32(section, &[MESSAGE_TIMEOUT_KEY, MESSAGE_TIMEOUT_KEY_ALT])?;
        model.use_encoding_lead_bytes = optional_bool(section, USE_ENCODING_LEAD_BYTES_KEY)?;
        model.settings = section.clone();
        model.retry_policy = QueueRetryPolicy::from_section(retry_section)?;

        Ok(model)
    }

    /// Set message encoding
    pub fn with_encoding(mut self, encoding: MessageEncoding) -> Self {
        self.message_encoding = encoding;
        self
    }

    /// Set timeout for blocking put/get calls
    pub fn with_message_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.message_timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable encoding lead bytes
    pub fn with_lead_bytes(mut self, use_lead_bytes: bool) -> Self {
        self.use_encoding_lead_bytes = use_lead_bytes;
        self
    }

    /// Set retry policy
    pub fn with_retry_policy(mut self, retry_policy: QueueRetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Add a passthrough setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Look up a passthrough setting case-insensitively
    pub fn setting(&self, key: &str) -> Option<&str> {
        lookup(&self.settings, &[key])
    }

    /// Timeout for blocking put/get calls
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.message_timeout_ms))
    }
}

// ============================================================================
// Section Helpers
// ============================================================================

/// Find the first of `keys` present in `section`, ignoring ASCII case
fn lookup<'a>(section: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|wanted| {
        section
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    })
}

fn required_u32(section: &HashMap<String, String>, keys: &[&str]) -> Result<u32, ConfigurationError> {
    let value = lookup(section, keys).ok_or_else(|| ConfigurationError::Missing {
        key: keys[0].to_string(),
    })?;

    value
        .trim()
        .parse::<u32>()
        .map_err(|e| ConfigurationError::Invalid {
            key: keys[0].to_string(),
            message: format!("'{}' is not a non-negative integer: {}", value, e),
        })
}

fn optional_bool(section: &HashMap<String, String>, key: &str) -> Result<bool, ConfigurationError> {
    match lookup(section, &[key]).map(str::trim) {
        None | Some("") => Ok(false),
        Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
        Some(value) => Err(ConfigurationError::Invalid {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", value),
        }),
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;

//! Logging initialisation for applications embedding the client.
//!
//! The client only emits `tracing` events. Installing a subscriber is up to
//! the host application; [`init_logging`] installs the usual one.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;

/// Key of the default log level in the settings file
pub const LOG_LEVEL_KEY: &str = "Logging.LogLevel.Default";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level; .NET level names are accepted
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Translate the configured level into an `EnvFilter` directive.
    ///
    /// Accepts both `tracing` names and the .NET names `Trace`, `Debug`,
    /// `Information`, `Warning`, `Error`, `Critical` and `None`.
    pub fn filter_directive(&self) -> Result<&'static str, ConfigurationError> {
        let directive = match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "verbose" => "trace",
            "debug" => "debug",
            "" | "info" | "information" => "info",
            "warn" | "warning" => "warn",
            "error" | "critical" | "fatal" => "error",
            "none" | "off" => "off",
            _ => {
                return Err(ConfigurationError::Invalid {
                    key: LOG_LEVEL_KEY.to_string(),
                    message: format!("unknown log level '{}'", self.level),
                })
            }
        };

        Ok(directive)
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigurationError> {
    let directive = config.filter_directive()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let (plain, json) = if config.json_format {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e| ConfigurationError::Logging {
            message: e.to_string(),
        })
}

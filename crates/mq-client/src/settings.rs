//! Settings loading from a JSON file overlaid by environment variables.
//!
//! The file layout follows `appsettings.json`:
//!
//! ```json
//! {
//!   "QueueManager": {
//!     "QUEUE_MANAGER_NAME": "QM1",
//!     "MESSAGE_ENCODING": "UTF8",
//!     "MESSAGE_TIMOUT_IN_MS": 5000,
//!     "USE_ENCODING_LEADING_BYTES": false,
//!     "RetryPolicy": {
//!       "WaitAndRetrySeconds": 1,
//!       "RetryCount": 2,
//!       "CircuitBreakerExceptionAllowedCount": 3,
//!       "CircutBreakerTimeoutSeconds": 5
//!     }
//!   },
//!   "Logging": { "LogLevel": { "Default": "Information" }, "JsonFormat": false }
//! }
//! ```
//!
//! Environment variables use `__` between sections, for example
//! `QueueManager__QUEUE_MANAGER_NAME=QM2`. Section and key names are matched
//! without regard to case.

use crate::error::ConfigurationError;
use crate::logging::LoggingConfig;
use crate::model::QueueManagerModel;
use config::{Map, Value, ValueKind};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Settings file read when no other path is given
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

pub const QUEUE_MANAGER_SECTION: &str = "QueueManager";
pub const RETRY_POLICY_SECTION: &str = "RetryPolicy";
pub const LOGGING_SECTION: &str = "Logging";

const LOG_LEVEL_SECTION: &str = "LogLevel";
const DEFAULT_LEVEL_KEY: &str = "Default";
const JSON_FORMAT_KEY: &str = "JsonFormat";
const ENV_SEPARATOR: &str = "__";

/// Raw settings for one client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    /// Flat scalar keys of the `QueueManager` section
    pub queue_manager: HashMap<String, String>,
    /// Scalar keys of `QueueManager.RetryPolicy`, if the section exists
    pub retry_policy: Option<HashMap<String, String>>,
    pub logging: LoggingConfig,
}

impl ClientSettings {
    /// Load settings from `path` overlaid by environment variables.
    ///
    /// The file must exist; a missing file is a [`ConfigurationError::Load`].
    /// With `env_prefix` set only variables named `<prefix>__...` are read.
    pub fn load(
        path: impl AsRef<Path>,
        env_prefix: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading settings");

        let file = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(true),
            )
            .build()
            .map_err(load_error)?;

        let environment = match env_prefix {
            Some(prefix) => config::Environment::with_prefix(prefix).prefix_separator(ENV_SEPARATOR),
            None => config::Environment::default(),
        }
        .separator(ENV_SEPARATOR);

        let env = config::Config::builder()
            .add_source(environment)
            .build()
            .map_err(load_error)?;

        let mut tree: Map<String, Value> = file.try_deserialize().map_err(load_error)?;
        let overlay: Map<String, Value> = env.try_deserialize().map_err(load_error)?;
        merge(&mut tree, overlay);

        Self::from_tree(&tree)
    }

    /// Extract settings from an already merged tree
    fn from_tree(tree: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let mut settings = Self::default();

        if let Some(section) = find_table(tree, QUEUE_MANAGER_SECTION)? {
            settings.queue_manager = scalars(section, QUEUE_MANAGER_SECTION)?;

            let retry_key = format!("{}.{}", QUEUE_MANAGER_SECTION, RETRY_POLICY_SECTION);
            if let Some(retry) = find_table(section, RETRY_POLICY_SECTION)? {
                settings.retry_policy = Some(scalars(retry, &retry_key)?);
            }
        }

        if let Some(logging) = find_table(tree, LOGGING_SECTION)? {
            if let Some(levels) = find_table(logging, LOG_LEVEL_SECTION)? {
                if let Some(level) = find(levels, DEFAULT_LEVEL_KEY) {
                    settings.logging.level = scalar(level, crate::logging::LOG_LEVEL_KEY)?;
                }
            }

            let json_key = format!("{}.{}", LOGGING_SECTION, JSON_FORMAT_KEY);
            if let Some(json) = find(logging, JSON_FORMAT_KEY) {
                let raw = scalar(json, &json_key)?;
                settings.logging.json_format = match raw.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" | "" => false,
                    _ => {
                        return Err(ConfigurationError::Invalid {
                            key: json_key,
                            message: format!("expected true or false, got '{}'", raw),
                        })
                    }
                };
            }
        }

        Ok(settings)
    }

    /// Translate the `QueueManager` section into a model
    pub fn queue_manager_model(&self) -> Result<QueueManagerModel, ConfigurationError> {
        QueueManagerModel::from_sections(&self.queue_manager, self.retry_policy.as_ref())
    }
}

fn load_error(error: config::ConfigError) -> ConfigurationError {
    ConfigurationError::Load {
        message: error.to_string(),
    }
}

/// Merge `overlay` into `base`, matching keys without regard to case
fn merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        let existing = base.keys().find(|k| k.eq_ignore_ascii_case(&key)).cloned();
        match existing {
            Some(existing) => {
                if let Some(slot) = base.get_mut(&existing) {
                    merge_value(slot, value);
                }
            }
            None => {
                base.insert(key, value);
            }
        }
    }
}

fn merge_value(slot: &mut Value, value: Value) {
    match value.kind {
        ValueKind::Table(incoming) => {
            if let ValueKind::Table(current) = &mut slot.kind {
                merge(current, incoming);
            } else {
                slot.kind = ValueKind::Table(incoming);
            }
        }
        kind => slot.kind = kind,
    }
}

fn find<'a>(table: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

fn find_table<'a>(
    table: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigurationError> {
    match find(table, key).map(|value| &value.kind) {
        None | Some(ValueKind::Nil) => Ok(None),
        Some(ValueKind::Table(section)) => Ok(Some(section)),
        Some(_) => Err(ConfigurationError::Invalid {
            key: key.to_string(),
            message: "expected a section".to_string(),
        }),
    }
}

fn scalar(value: &Value, key: &str) -> Result<String, ConfigurationError> {
    value
        .clone()
        .into_string()
        .map_err(|e| ConfigurationError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Scalar entries of a section; nested sections are skipped
fn scalars(
    section: &Map<String, Value>,
    section_name: &str,
) -> Result<HashMap<String, String>, ConfigurationError> {
    let mut values = HashMap::new();
    for (key, value) in section {
        if matches!(
            value.kind,
            ValueKind::Table(_) | ValueKind::Array(_) | ValueKind::Nil
        ) {
            continue;
        }
        let full_key = format!("{}.{}", section_name, key);
        values.insert(key.clone(), scalar(value, &full_key)?);
    }
    Ok(values)
}

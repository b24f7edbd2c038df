//! Broker configuration
//!
//! Every tunable of the queue and of the polling workers lives in
//! [`BrokerConfig`]. Values come from defaults, from a TOML table (the
//! `[broker]` section of the binary's config file, or a standalone file)
//! and finally from command-line overrides applied by the caller.

use crate::core::retry::RetryPolicy;
use crate::queue::{FullPolicy, DEFAULT_TOPIC_CAPACITY};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_HANDLER_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Queue and subscription settings
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// Messages retained per topic before enqueue rejects or waits
    pub topic_buffer_capacity: usize,
    /// Worker tick period
    pub poll_interval: Duration,
    /// Behaviour of enqueue on a full topic
    pub full_policy: FullPolicy,
    /// Handler invocations per message; 1 keeps at-most-once delivery
    pub handler_attempts: usize,
    /// Pause between handler attempts
    pub handler_retry_delay: Duration,
    /// Topic receiving messages whose handler failed every attempt
    pub dead_letter_topic: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            topic_buffer_capacity: DEFAULT_TOPIC_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            full_policy: FullPolicy::Reject,
            handler_attempts: 1,
            handler_retry_delay: DEFAULT_HANDLER_RETRY_DELAY,
            dead_letter_topic: None,
        }
    }
}

impl BrokerConfig {
    /// Parse a TOML document; keys may sit at the top level or under `[broker]`
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table = toml::from_str::<toml::Table>(contents)?;
        let section = match table.get("broker").and_then(|v| v.as_table()) {
            Some(section) => section,
            None => &table,
        };

        let mut config = Self::default();
        config.apply_toml(section)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply recognised keys from a TOML table; unknown keys are ignored
    pub fn apply_toml(&mut self, table: &toml::Table) -> Result<(), ConfigError> {
        if let Some(value) = table.get("topic-buffer-capacity") {
            self.topic_buffer_capacity = positive_integer("topic-buffer-capacity", value)?;
        }
        if let Some(value) = table.get("poll-interval-ms") {
            let millis = positive_integer("poll-interval-ms", value)?;
            self.poll_interval = Duration::from_millis(millis as u64);
        }
        if let Some(value) = table.get("full-policy") {
            let policy = value
                .as_str()
                .ok_or_else(|| invalid("full-policy", "expected a string"))?;
            self.full_policy = policy
                .parse()
                .map_err(|message: String| invalid("full-policy", message))?;
        }
        if let Some(value) = table.get("handler-attempts") {
            self.handler_attempts = positive_integer("handler-attempts", value)?;
        }
        if let Some(value) = table.get("handler-retry-delay-ms") {
            let millis = value
                .as_integer()
                .filter(|millis| *millis >= 0)
                .ok_or_else(|| invalid("handler-retry-delay-ms", "expected a non-negative integer"))?;
            self.handler_retry_delay = Duration::from_millis(millis as u64);
        }
        if let Some(value) = table.get("dead-letter-topic") {
            let topic = value
                .as_str()
                .ok_or_else(|| invalid("dead-letter-topic", "expected a string"))?;
            // "none" and "-" switch an inherited dead-letter topic off
            self.dead_letter_topic = match topic {
                "-" => None,
                t if t.eq_ignore_ascii_case("none") => None,
                t => Some(t.to_string()),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_buffer_capacity == 0 {
            return Err(invalid("topic-buffer-capacity", "must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(invalid("poll-interval-ms", "must be at least 1ms"));
        }
        if self.handler_attempts == 0 {
            return Err(invalid("handler-attempts", "must be at least 1"));
        }
        if let Some(topic) = &self.dead_letter_topic {
            if topic.trim().is_empty() {
                return Err(invalid("dead-letter-topic", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Retry policy applied to handler invocations
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.handler_attempts.max(1),
            delay: self.handler_retry_delay,
        }
    }
}

fn positive_integer(key: &str, value: &toml::Value) -> Result<usize, ConfigError> {
    value
        .as_integer()
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(key, "expected a positive integer"))
}

//! TOML configuration file loading and settings resolution
//!
//! Precedence, lowest first: built-in defaults, the configuration file
//! (explicit `--config-file`, otherwise `<config dir>/topicq/topicq.toml`
//! when it exists), then command-line flags.
//!
//! ```toml
//! log-level = "debug"
//! topic = "orders"
//! publish-interval-ms = 500
//!
//! [broker]
//! topic-buffer-capacity = 100
//! full-policy = "block"
//! dead-letter-topic = "orders.dlq"
//! ```

use super::args::Args;
use crate::broker::{BrokerConfig, ConfigError};
use crate::core::logging::{LogFormat, LoggingOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TOPIC: &str = "orders";
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(2000);

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("topicq").join("topicq.toml"))
}

/// Pick the config file to load
///
/// An explicit path must exist; the default path is used only if present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match explicit {
        Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        }),
        None => Ok(default_config_path().filter(|path| path.exists())),
    }
}

pub async fn load_config_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(toml::from_str::<toml::Table>(&contents)?)
}

/// Fully resolved settings for one run of the demo
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub logging: LoggingOptions,
    /// `None` means auto-detect from the terminal
    pub color: Option<bool>,
    pub topic: String,
    pub publish_interval: Duration,
    pub duration: Option<Duration>,
    pub broker: BrokerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingOptions::default(),
            color: None,
            topic: DEFAULT_TOPIC.to_string(),
            publish_interval: DEFAULT_PUBLISH_INTERVAL,
            duration: None,
            broker: BrokerConfig::default(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn string_value<'a>(table: &'a toml::Table, key: &str) -> Result<Option<&'a str>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a string")),
    }
}

fn millis_value(table: &toml::Table, key: &str) -> Result<Option<Duration>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .filter(|n| *n > 0)
            .map(|n| Some(Duration::from_millis(n as u64)))
            .ok_or_else(|| invalid(key, "expected a positive integer")),
    }
}

impl Settings {
    /// Load the config file (if any) and apply command-line overrides
    pub async fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(path) = resolve_config_path(args.config_file.as_deref())? {
            let table = load_config_table(&path).await?;
            settings.apply_toml(&table)?;
        }
        settings.apply_args(args)?;
        settings.broker.validate()?;
        Ok(settings)
    }

    /// Apply a parsed config file
    ///
    /// Broker keys are read from a `[broker]` section when present,
    /// otherwise from the top level.
    pub fn apply_toml(&mut self, table: &toml::Table) -> Result<(), ConfigError> {
        if let Some(level) = string_value(table, "log-level")? {
            self.logging.level = level.to_string();
        }
        if let Some(format) = string_value(table, "log-format")? {
            self.logging.format = format
                .parse::<LogFormat>()
                .map_err(|message| invalid("log-format", message))?;
        }
        if let Some(file) = string_value(table, "log-file")? {
            // "none" and "-" disable file logging
            self.logging.file = if file == "-" || file.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(file))
            };
        }
        if let Some(value) = table.get("color") {
            let color = value
                .as_bool()
                .ok_or_else(|| invalid("color", "expected true or false"))?;
            self.color = Some(color);
        }
        if let Some(topic) = string_value(table, "topic")? {
            self.topic = topic.to_string();
        }
        if let Some(interval) = millis_value(table, "publish-interval-ms")? {
            self.publish_interval = interval;
        }
        if let Some(value) = table.get("duration-secs") {
            let secs = value
                .as_integer()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("duration-secs", "expected a positive integer"))?;
            self.duration = Some(Duration::from_secs(secs as u64));
        }

        let broker_section = match table.get("broker") {
            Some(value) => value
                .as_table()
                .ok_or_else(|| invalid("broker", "expected a table"))?,
            None => table,
        };
        self.broker.apply_toml(broker_section)
    }

    /// Apply command-line flags that were given
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            self.logging.format = format
                .parse::<LogFormat>()
                .map_err(|message| invalid("log-format", message))?;
        }
        if let Some(file) = &args.log_file {
            self.logging.file = match file.to_str() {
                Some("-") => None,
                Some(name) if name.eq_ignore_ascii_case("none") => None,
                _ => Some(file.clone()),
            };
        }
        if args.color.is_some() {
            self.color = args.color;
        }
        if let Some(topic) = &args.topic {
            if topic.trim().is_empty() {
                return Err(invalid("topic", "must not be empty"));
            }
            self.topic = topic.clone();
        }
        if let Some(millis) = args.publish_interval_ms {
            if millis == 0 {
                return Err(invalid("publish-interval-ms", "must be at least 1"));
            }
            self.publish_interval = Duration::from_millis(millis);
        }
        if let Some(secs) = args.duration_secs {
            self.duration = Some(Duration::from_secs(secs));
        }

        if let Some(capacity) = args.capacity {
            self.broker.topic_buffer_capacity = capacity;
        }
        if let Some(millis) = args.poll_interval_ms {
            self.broker.poll_interval = Duration::from_millis(millis);
        }
        if let Some(policy) = &args.full_policy {
            self.broker.full_policy = policy
                .parse()
                .map_err(|message: String| invalid("full-policy", message))?;
        }
        if let Some(attempts) = args.handler_attempts {
            self.broker.handler_attempts = attempts;
        }
        if let Some(topic) = &args.dead_letter_topic {
            self.broker.dead_letter_topic = Some(topic.clone());
        }
        Ok(())
    }

    /// Resolve auto color against whether stderr is a terminal
    pub fn use_color(&self, is_terminal: bool) -> bool {
        self.color.unwrap_or(is_terminal)
    }
}

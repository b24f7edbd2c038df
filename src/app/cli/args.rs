//! Command-line arguments
//!
//! Every option is optional so that unset flags leave values from the
//! configuration file untouched; defaults are applied in
//! [`super::config::Settings`].

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "topicq")]
#[command(about = "Topic queue demo: publishes orders and consumes them in-process")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Color output control (true/false); unset means auto-detect
    #[arg(short = 'g', long = "color", value_name = "BOOL")]
    pub color: Option<bool>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to log to stderr)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Topic the demo publishes to and consumes from
    #[arg(short = 't', long = "topic", value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Milliseconds between published orders
    #[arg(short = 'i', long = "publish-interval-ms", value_name = "MS")]
    pub publish_interval_ms: Option<u64>,

    /// Stop automatically after this many seconds
    #[arg(short = 'd', long = "duration-secs", value_name = "SECONDS")]
    pub duration_secs: Option<u64>,

    /// Per-topic buffer capacity
    #[arg(long = "capacity", value_name = "COUNT")]
    pub capacity: Option<usize>,

    /// Milliseconds between worker polls
    #[arg(long = "poll-interval-ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// What enqueue does when a topic buffer is full
    #[arg(long = "full-policy", value_name = "POLICY", value_parser = ["reject", "block"])]
    pub full_policy: Option<String>,

    /// Handler invocations per message before it counts as failed
    #[arg(long = "handler-attempts", value_name = "COUNT")]
    pub handler_attempts: Option<usize>,

    /// Topic receiving messages whose handler failed every attempt
    #[arg(long = "dead-letter-topic", value_name = "TOPIC")]
    pub dead_letter_topic: Option<String>,
}

impl Args {
    pub fn parse_from_env() -> Self {
        Self::parse()
    }
}

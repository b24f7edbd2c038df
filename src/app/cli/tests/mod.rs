//! Tests for the CLI module
//!
//! Argument parsing and settings resolution from TOML files and flags.

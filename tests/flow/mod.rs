//! End-to-end test modules

pub mod config_file;
pub mod demo;
pub mod pipeline;

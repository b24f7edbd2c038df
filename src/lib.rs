pub mod app;
pub mod broker;
pub mod core;
pub mod queue;

//! Demo application: order producer and consumer on one in-process queue

pub mod cli;
pub mod services;
pub mod startup;

//! Core infrastructure shared by the queue, broker and application layers

pub mod logging;
pub mod retry;
pub mod shutdown;
pub mod sync;

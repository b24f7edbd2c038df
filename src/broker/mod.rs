//! Producer / Consumer Layer
//!
//! Publishing and subscription management on top of a shared [`Queue`].
//!
//! # Overview
//!
//! - [`QueueProducer`] stamps payloads into [`Message`]s and enqueues them
//! - [`QueueConsumer`] keeps one polling worker per subscribed topic
//! - Each worker polls at a fixed interval and calls the topic's
//!   [`MessageHandler`] for at most one message per tick
//! - Shutdown runs in two phases: close the consumers (waiting for in-flight
//!   handlers), then close the queue
//!
//! ```text
//!  QueueProducer ──publish──▶ Queue ◀──dequeue── worker(orders)  ──▶ handler
//!                                   ◀──dequeue── worker(audit)   ──▶ handler
//!                                                    ▲
//!                                   QueueConsumer ───┘ subscribe / unsubscribe / close
//! ```
//!
//! [`Queue`]: crate::queue::Queue
//! [`Message`]: crate::queue::Message

pub mod config;
mod consumer;
mod error;
mod handler;
mod producer;
mod traits;
mod worker;

pub use config::{BrokerConfig, ConfigError};
pub use consumer::QueueConsumer;
pub use error::{BrokerError, BrokerResult};
pub use handler::{handler_fn, HandlerError, HandlerResult, MessageHandler};
pub use producer::QueueProducer;
pub use traits::{Consumer, Producer};
pub use worker::{SubscriptionInfo, WorkerState};

#[cfg(test)]
mod tests;

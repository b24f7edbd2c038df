//! Producer and consumer roles
//!
//! Both roles sit on top of a shared `Arc<dyn Queue>`; the traits let
//! services depend on the role rather than on a concrete implementation.

use crate::broker::error::BrokerResult;
use crate::broker::handler::MessageHandler;
use crate::queue::Headers;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Publishing side
#[async_trait]
pub trait Producer: Send + Sync {
    /// Stamp a new message and enqueue it on `topic`, returning its id
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        payload: Vec<u8>,
        headers: Headers,
    ) -> BrokerResult<String>;

    /// Release producer resources; the shared queue stays open
    fn close(&self) -> BrokerResult<()>;
}

/// Subscribing side
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Start one polling worker delivering `topic` messages to `handler`
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> BrokerResult<()>;

    /// Stop the worker for `topic` and wait until it has finished
    async fn unsubscribe(&self, topic: &str) -> BrokerResult<()>;

    /// Stop every worker and wait for all of them. Idempotent.
    async fn close(&self) -> BrokerResult<()>;
}

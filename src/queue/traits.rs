//! Traits for the queue system
//!
//! `Queue` is the storage capability set shared by every backing store.
//! Producers and consumers only ever see an `Arc<dyn Queue>`, so the
//! in-memory store and the test double are interchangeable.

use crate::queue::error::QueueResult;
use crate::queue::message::Message;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Topic-keyed message store
///
/// Implementations must be safe to call concurrently from any number of
/// tasks and threads.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append `message` to the buffer of `topic`, creating the buffer if
    /// this is the first message for the topic.
    ///
    /// Only this operation may suspend: when the topic is at capacity and
    /// the store waits for space, `cancel` aborts the wait.
    async fn enqueue(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        message: Message,
    ) -> QueueResult<()>;

    /// Remove and return the oldest buffered message of `topic`
    ///
    /// Returns `Ok(None)` for an empty or unknown topic. Never waits.
    fn dequeue(&self, topic: &str) -> QueueResult<Option<Message>>;

    /// Number of messages currently buffered for `topic` (0 if unknown)
    fn size(&self, topic: &str) -> QueueResult<usize>;

    /// Every topic that has received at least one enqueue
    fn topics(&self) -> QueueResult<Vec<String>>;

    /// Close the store and discard buffered messages. Idempotent.
    fn close(&self) -> QueueResult<()>;

    /// True once `close` has been called
    fn is_closed(&self) -> bool;
}

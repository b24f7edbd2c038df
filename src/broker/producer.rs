//! Queue Producer for publishing messages
//!
//! A producer turns a payload and headers into a [`Message`] (fresh id,
//! current timestamp) and enqueues it on the shared queue. Several producers
//! may wrap the same queue; closing a producer never closes the queue.

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::traits::Producer;
use crate::queue::{Headers, Message, Queue};
use async_trait::async_trait;
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Producer handle over a shared queue
///
/// # Example
///
/// ```rust,no_run
/// # use topicq::broker::{Producer, QueueProducer};
/// # use topicq::queue::{Headers, InMemoryQueue};
/// # use std::sync::Arc;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = Arc::new(InMemoryQueue::new());
/// let producer = QueueProducer::new(queue.clone());
///
/// let id = producer
///     .publish(&CancellationToken::new(), "orders", b"{}".to_vec(), Headers::new())
///     .await?;
/// println!("Published message {}", id);
/// # Ok(())
/// # }
/// ```
pub struct QueueProducer {
    producer_id: String,
    queue: Arc<dyn Queue>,
    closed: AtomicBool,
}

impl QueueProducer {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self::with_id(queue, format!("producer-{}", uuid::Uuid::new_v4()))
    }

    pub fn with_id(queue: Arc<dyn Queue>, producer_id: impl Into<String>) -> Self {
        Self {
            producer_id: producer_id.into(),
            queue,
            closed: AtomicBool::new(false),
        }
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Producer for QueueProducer {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        payload: Vec<u8>,
        headers: Headers,
    ) -> BrokerResult<String> {
        if self.is_closed() {
            return Err(BrokerError::ProducerClosed);
        }

        let message = Message::new(topic, payload, headers);
        let message_id = message.id().to_string();
        self.queue.enqueue(cancel, topic, message).await?;

        trace!(
            "{} published message {} to topic '{}'",
            self.producer_id,
            message_id,
            topic
        );
        Ok(message_id)
    }

    fn close(&self) -> BrokerResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("{} closed", self.producer_id);
        }
        Ok(())
    }
}

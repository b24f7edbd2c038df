//! InMemoryQueue: bounded per-topic FIFO buffers
//!
//! This module provides the default queue store with:
//! - One FIFO buffer per topic, created on first enqueue
//! - A uniform capacity per topic with an explicit full-buffer policy
//! - A single RwLock over the topic map and the closed flag
//! - Close semantics that discard buffered messages and wake blocked producers

use crate::broker::config::BrokerConfig;
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::traits::Queue;
use crate::queue::types::{FullPolicy, DEFAULT_TOPIC_CAPACITY};
use async_trait::async_trait;
use log::{debug, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct QueueState {
    topics: HashMap<String, VecDeque<Message>>,
    closed: bool,
}

/// Outcome of a single non-waiting push attempt
enum Push {
    Stored,
    Full(Message),
}

fn internal_error(message: String) -> QueueError {
    QueueError::Internal { message }
}

/// In-memory topic store
///
/// # Example
///
/// ```rust
/// use topicq::queue::{Headers, InMemoryQueue, Message, Queue};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = InMemoryQueue::new();
/// let cancel = CancellationToken::new();
///
/// queue
///     .enqueue(&cancel, "orders", Message::new("orders", b"1".to_vec(), Headers::new()))
///     .await?;
/// assert_eq!(queue.size("orders")?, 1);
///
/// let message = queue.dequeue("orders")?.expect("one message buffered");
/// assert_eq!(message.payload(), b"1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryQueue {
    state: RwLock<QueueState>,
    /// Woken whenever a dequeue frees a slot or the queue closes
    space_available: Notify,
    capacity: usize,
    full_policy: FullPolicy,
}

impl InMemoryQueue {
    /// Queue with the default capacity and the `Reject` policy
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY, FullPolicy::Reject)
    }

    /// Queue with an explicit per-topic capacity and full-buffer policy
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize, full_policy: FullPolicy) -> Self {
        Self {
            state: RwLock::new(QueueState::default()),
            space_available: Notify::new(),
            capacity: capacity.max(1),
            full_policy,
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::with_capacity(config.topic_buffer_capacity, config.full_policy)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn full_policy(&self) -> FullPolicy {
        self.full_policy
    }

    fn try_push(&self, topic: &str, message: Message) -> QueueResult<Push> {
        let mut state = handle_rwlock_write(self.state.write(), internal_error)?;
        if state.closed {
            return Err(QueueError::Closed);
        }

        if !state.topics.contains_key(topic) {
            debug!("Creating buffer for topic '{}'", topic);
            state.topics.insert(topic.to_string(), VecDeque::new());
        }

        let capacity = self.capacity;
        match state.topics.get_mut(topic) {
            Some(buffer) if buffer.len() >= capacity => Ok(Push::Full(message)),
            Some(buffer) => {
                buffer.push_back(message);
                Ok(Push::Stored)
            }
            None => Err(internal_error(format!(
                "buffer for topic '{}' vanished during enqueue",
                topic
            ))),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        message: Message,
    ) -> QueueResult<()> {
        let mut message = message;
        loop {
            // Registered before the push so a dequeue racing with the wait is not missed.
            let space = self.space_available.notified();

            match self.try_push(topic, message)? {
                Push::Stored => {
                    trace!("Enqueued message to topic '{}'", topic);
                    return Ok(());
                }
                Push::Full(rejected) => match self.full_policy {
                    FullPolicy::Reject => {
                        warn!(
                            "Topic '{}' is full ({} messages), rejecting message {}",
                            topic,
                            self.capacity,
                            rejected.id()
                        );
                        return Err(QueueError::TopicFull {
                            topic: topic.to_string(),
                            capacity: self.capacity,
                        });
                    }
                    FullPolicy::Block => {
                        message = rejected;
                        tokio::select! {
                            _ = space => {}
                            _ = cancel.cancelled() => {
                                return Err(QueueError::Cancelled {
                                    topic: topic.to_string(),
                                });
                            }
                        }
                    }
                },
            }
        }
    }

    fn dequeue(&self, topic: &str) -> QueueResult<Option<Message>> {
        let message = {
            let mut state = handle_rwlock_write(self.state.write(), internal_error)?;
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.topics.get_mut(topic).and_then(VecDeque::pop_front)
        };

        if message.is_some() {
            trace!("Dequeued message from topic '{}'", topic);
            self.space_available.notify_waiters();
        }

        Ok(message)
    }

    fn size(&self, topic: &str) -> QueueResult<usize> {
        let state = handle_rwlock_read(self.state.read(), internal_error)?;
        if state.closed {
            return Err(QueueError::Closed);
        }
        Ok(state.topics.get(topic).map_or(0, VecDeque::len))
    }

    fn topics(&self) -> QueueResult<Vec<String>> {
        let state = handle_rwlock_read(self.state.read(), internal_error)?;
        if state.closed {
            return Err(QueueError::Closed);
        }
        let mut topics: Vec<String> = state.topics.keys().cloned().collect();
        topics.sort();
        Ok(topics)
    }

    fn close(&self) -> QueueResult<()> {
        let discarded = {
            let mut state = handle_rwlock_write(self.state.write(), internal_error)?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            let discarded: usize = state.topics.values().map(VecDeque::len).sum();
            state.topics = HashMap::new();
            discarded
        };

        self.space_available.notify_waiters();
        debug!("Queue closed, {} buffered messages discarded", discarded);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.read().map(|state| state.closed).unwrap_or(true)
    }
}

//! MockQueue: a scriptable queue for tests
//!
//! Behaves like an unbounded in-memory store, records every message it
//! accepts and can be told to fail the next few enqueue/dequeue calls. Code
//! built on producers and consumers can use it to exercise error paths that
//! the real store only hits under contention.

use crate::core::sync::handle_mutex_poison;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::traits::Queue;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct MockState {
    topics: HashMap<String, VecDeque<Message>>,
    closed: bool,
    published: Vec<Message>,
    dequeue_calls: usize,
    enqueue_failures: Option<(usize, QueueError)>,
    dequeue_failures: Option<(usize, QueueError)>,
}

/// Take one scripted failure if any remain
fn take_failure(slot: &mut Option<(usize, QueueError)>) -> Option<QueueError> {
    let (remaining, error) = slot.as_mut()?;
    let error = error.clone();
    *remaining -= 1;
    if *remaining == 0 {
        *slot = None;
    }
    Some(error)
}

fn internal_error(message: String) -> QueueError {
    QueueError::Internal { message }
}

#[derive(Debug, Default)]
pub struct MockQueue {
    state: Mutex<MockState>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` enqueue calls fail with `error`
    pub fn fail_next_enqueues(&self, count: usize, error: QueueError) {
        if let Ok(mut state) = self.state.lock() {
            state.enqueue_failures = (count > 0).then_some((count, error));
        }
    }

    /// Make the next `count` dequeue calls fail with `error`
    pub fn fail_next_dequeues(&self, count: usize, error: QueueError) {
        if let Ok(mut state) = self.state.lock() {
            state.dequeue_failures = (count > 0).then_some((count, error));
        }
    }

    /// Every message accepted so far, in enqueue order
    pub fn published(&self) -> Vec<Message> {
        self.state
            .lock()
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }

    /// Number of dequeue calls made, including failed ones
    pub fn dequeue_calls(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.dequeue_calls)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Queue for MockQueue {
    async fn enqueue(
        &self,
        _cancel: &CancellationToken,
        topic: &str,
        message: Message,
    ) -> QueueResult<()> {
        let mut state = handle_mutex_poison(self.state.lock(), internal_error)?;
        if let Some(error) = take_failure(&mut state.enqueue_failures) {
            return Err(error);
        }
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.published.push(message.clone());
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .push_back(message);
        Ok(())
    }

    fn dequeue(&self, topic: &str) -> QueueResult<Option<Message>> {
        let mut state = handle_mutex_poison(self.state.lock(), internal_error)?;
        state.dequeue_calls += 1;
        if let Some(error) = take_failure(&mut state.dequeue_failures) {
            return Err(error);
        }
        if state.closed {
            return Err(QueueError::Closed);
        }
        Ok(state.topics.get_mut(topic).and_then(VecDeque::pop_front))
    }

    fn size(&self, topic: &str) -> QueueResult<usize> {
        let state = handle_mutex_poison(self.state.lock(), internal_error)?;
        if state.closed {
            return Err(QueueError::Closed);
        }
        Ok(state.topics.get(topic).map_or(0, VecDeque::len))
    }

    fn topics(&self) -> QueueResult<Vec<String>> {
        let state = handle_mutex_poison(self.state.lock(), internal_error)?;
        if state.closed {
            return Err(QueueError::Closed);
        }
        let mut topics: Vec<String> = state.topics.keys().cloned().collect();
        topics.sort();
        Ok(topics)
    }

    fn close(&self) -> QueueResult<()> {
        let mut state = handle_mutex_poison(self.state.lock(), internal_error)?;
        state.closed = true;
        state.topics.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().map(|state| state.closed).unwrap_or(true)
    }
}

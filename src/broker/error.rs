//! Broker Error Types
//!
//! Queue errors pass through producers and consumers unchanged inside
//! [`BrokerError::Queue`]; subscription-state violations get their own
//! variants. `HandlerFailed` never leaves a polling worker: it only shows
//! up in logs and statistics.

use crate::queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Producer is closed")]
    ProducerClosed,

    #[error("Consumer is closed")]
    ConsumerClosed,

    #[error("Already subscribed to topic: {topic}")]
    AlreadySubscribed { topic: String },

    #[error("Not subscribed to topic: {topic}")]
    NotSubscribed { topic: String },

    #[error("Handler failed for message {message_id} on topic '{topic}': {cause}")]
    HandlerFailed {
        topic: String,
        message_id: String,
        cause: String,
    },

    #[error("Internal broker error: {message}")]
    Internal { message: String },
}

impl BrokerError {
    /// The underlying queue error, if this error came from the queue
    pub fn queue_error(&self) -> Option<&QueueError> {
        match self {
            BrokerError::Queue(error) => Some(error),
            _ => None,
        }
    }
}

/// Result type for producer and consumer operations
pub type BrokerResult<T> = Result<T, BrokerError>;

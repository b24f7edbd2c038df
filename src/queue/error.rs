//! Queue Error Types

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,

    #[error("Topic '{topic}' is full (capacity: {capacity})")]
    TopicFull { topic: String, capacity: usize },

    #[error("Enqueue to topic '{topic}' was cancelled")]
    Cancelled { topic: String },

    #[error("Internal queue error: {message}")]
    Internal { message: String },
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

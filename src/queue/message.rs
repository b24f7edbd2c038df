//! Message type carried through the queue
//!
//! A message is created once (normally by a producer), buffered by a queue
//! under exactly one topic and finally handed to a subscriber's handler.
//! Fields are private so a message cannot change after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// String key/value metadata attached to a message
pub type Headers = HashMap<String, String>;

/// Immutable message moving through the queue
///
/// # Example
///
/// ```rust
/// use topicq::queue::{Headers, Message};
///
/// let mut headers = Headers::new();
/// headers.insert("source".to_string(), "billing".to_string());
///
/// let message = Message::new("orders", b"{\"id\":1}".to_vec(), headers);
/// assert_eq!(message.topic(), "orders");
/// assert_eq!(message.header("source"), Some("billing"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    topic: String,
    payload: Vec<u8>,
    #[serde(default)]
    headers: Headers,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message with a fresh UUID v4 id and the current time
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, headers: Headers) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            payload,
            headers,
            timestamp: Utc::now(),
        }
    }

    /// Build a message with every field supplied by the caller
    ///
    /// Id uniqueness is the caller's responsibility; queues never check it.
    pub fn with_id(
        id: impl Into<String>,
        topic: impl Into<String>,
        payload: Vec<u8>,
        headers: Headers,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            payload,
            headers,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Look up a single header value
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

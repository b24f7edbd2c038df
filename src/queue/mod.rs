//! Topic Queue Component
//!
//! Topic-keyed message storage shared by producers and consumers.
//!
//! # Overview
//!
//! - **Topics**: each message belongs to exactly one named topic
//! - **Bounded buffers**: one FIFO buffer per topic, created on first enqueue,
//!   with a fixed capacity and an explicit [`FullPolicy`]
//! - **Poll semantics**: `dequeue` never waits; an empty topic yields `None`
//! - **Close**: discards every buffered message; later calls fail with
//!   [`QueueError::Closed`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌───────────────────────────────┐
//! │  Producer A  │──────────▶ │          InMemoryQueue        │
//! └──────────────┘            │  RwLock { topics, closed }    │
//! ┌──────────────┐  enqueue   │  ┌─────────┬───┬───┬───┐      │
//! │  Producer B  │──────────▶ │  │ orders  │ 1 │ 2 │ 3 │      │
//! └──────────────┘            │  ├─────────┼───┼───┴───┘      │
//!                             │  │ audit   │ 1 │              │
//!                             │  └─────────┴───┘              │
//!                             └──────────────┬────────────────┘
//!                                            │ dequeue (poll)
//!                                   ┌────────┴────────┐
//!                                   │ Polling workers │
//!                                   └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use topicq::queue::{FullPolicy, Headers, InMemoryQueue, Message, Queue};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = InMemoryQueue::with_capacity(100, FullPolicy::Reject);
//! let cancel = CancellationToken::new();
//!
//! let message = Message::new("orders", b"order-1".to_vec(), Headers::new());
//! queue.enqueue(&cancel, "orders", message).await?;
//!
//! while let Some(message) = queue.dequeue("orders")? {
//!     println!("Received {} bytes", message.payload().len());
//! }
//! queue.close()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod message;
mod mock;
mod traits;
mod types;

pub use error::{QueueError, QueueResult};
pub use memory::InMemoryQueue;
pub use message::{Headers, Message};
pub use mock::MockQueue;
pub use traits::Queue;
pub use types::{FullPolicy, DEFAULT_TOPIC_CAPACITY};

#[cfg(test)]
mod tests;

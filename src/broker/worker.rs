//! Polling worker for one (consumer, topic) subscription
//!
//! The worker ticks at a fixed interval, dequeues at most one message per
//! tick and hands it to the subscription's handler. Cancellation is checked
//! before every tick and never interrupts a handler that is already running.
//! Queue errors skip the tick; handler errors and panics are logged and
//! counted, optionally retried and dead-lettered, and never stop the loop.
//! A message whose retries are cut short by cancellation is dropped, not
//! dead-lettered.

use crate::broker::error::BrokerError;
use crate::broker::handler::{HandlerError, HandlerResult, MessageHandler};
use crate::core::retry::{retry_async, RetryError, RetryPolicy};
use crate::queue::{Message, Queue};
use futures::FutureExt;
use log::{debug, info, warn};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a polling worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Polling the topic
    Running,
    /// Cancellation requested; the current cycle is finishing
    Stopping,
    /// Loop has exited
    Stopped,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Running => 0,
            WorkerState::Stopping => 1,
            WorkerState::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub topic: String,
    pub state: WorkerState,
    /// Ticks that reached the queue
    pub polls: u64,
    /// Messages the handler accepted
    pub delivered: u64,
    /// Messages whose handler failed or panicked on every attempt
    pub handler_failures: u64,
    /// Ticks skipped because the queue returned an error
    pub queue_errors: u64,
    pub dead_lettered: u64,
    /// Messages dropped with retries left because the subscription was cancelled
    pub abandoned: u64,
}

/// How one message's trip through the handler ended
#[derive(Debug)]
enum Delivery {
    Delivered,
    /// Every allowed attempt failed
    Failed(BrokerError),
    /// The subscription was cancelled while retries were still left
    Abandoned { attempts: usize, cause: String },
}

/// Counters shared between a worker and its owning consumer
#[derive(Debug)]
pub(crate) struct WorkerStats {
    state: AtomicU8,
    polls: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
    queue_errors: AtomicU64,
    dead_lettered: AtomicU64,
    abandoned: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Running.as_u8()),
            polls: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            queue_errors: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Running -> Stopping; a stopped worker stays stopped
    pub(crate) fn mark_stopping(&self) {
        let _ = self.state.compare_exchange(
            WorkerState::Running.as_u8(),
            WorkerState::Stopping.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_stopped(&self) {
        self.state
            .store(WorkerState::Stopped.as_u8(), Ordering::Release);
    }

    pub(crate) fn snapshot(&self, topic: &str) -> SubscriptionInfo {
        SubscriptionInfo {
            topic: topic.to_string(),
            state: self.state(),
            polls: self.polls.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            queue_errors: self.queue_errors.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Everything a worker needs to run one subscription
pub(crate) struct PollingWorker {
    pub(crate) consumer_id: String,
    pub(crate) topic: String,
    pub(crate) queue: Arc<dyn Queue>,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) cancel: CancellationToken,
    pub(crate) poll_interval: Duration,
    pub(crate) retry: RetryPolicy,
    pub(crate) dead_letter_topic: Option<String>,
    pub(crate) stats: Arc<WorkerStats>,
}

impl PollingWorker {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        debug!(
            "{}: polling worker for topic '{}' started (interval {:?})",
            self.consumer_id, self.topic, self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }

        self.stats.mark_stopped();
        debug!(
            "{}: polling worker for topic '{}' stopped",
            self.consumer_id, self.topic
        );
    }

    /// One poll cycle: dequeue at most one message and deliver it
    async fn poll_once(&self) {
        self.stats.polls.fetch_add(1, Ordering::Relaxed);

        let message = match self.queue.dequeue(&self.topic) {
            Ok(Some(message)) => Arc::new(message),
            Ok(None) => return,
            Err(e) => {
                self.stats.queue_errors.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "{}: skipping poll of topic '{}': {}",
                    self.consumer_id, self.topic, e
                );
                return;
            }
        };

        match self.deliver(Arc::clone(&message)).await {
            Delivery::Delivered => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Failed(e) => {
                self.stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                warn!("{}: {}", self.consumer_id, e);
                self.dead_letter(&message).await;
            }
            Delivery::Abandoned { attempts, cause } => {
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "{}: dropping message {} from topic '{}' after {} of {} attempt(s), subscription cancelled: {}",
                    self.consumer_id,
                    message.id(),
                    self.topic,
                    attempts,
                    self.retry.max_attempts.max(1),
                    cause
                );
            }
        }
    }

    async fn deliver(&self, message: Arc<Message>) -> Delivery {
        let handler_cancel = self.cancel.child_token();
        let operation_name = format!("{}:{}", self.consumer_id, self.topic);

        let outcome = retry_async(&operation_name, self.retry.clone(), &handler_cancel, || {
            invoke_guarded(
                Arc::clone(&self.handler),
                handler_cancel.clone(),
                Arc::clone(&message),
            )
        })
        .await;

        match outcome {
            Ok(()) => Delivery::Delivered,
            Err(RetryError::Exhausted(cause)) => Delivery::Failed(BrokerError::HandlerFailed {
                topic: self.topic.clone(),
                message_id: message.id().to_string(),
                cause: cause.to_string(),
            }),
            Err(RetryError::Cancelled { error, attempts }) => Delivery::Abandoned {
                attempts,
                cause: error.to_string(),
            },
        }
    }

    async fn dead_letter(&self, message: &Message) {
        let Some(target) = self.dead_letter_topic.as_deref() else {
            return;
        };
        if target == self.topic {
            warn!(
                "{}: dead-letter topic equals subscribed topic '{}', dropping message {}",
                self.consumer_id,
                self.topic,
                message.id()
            );
            return;
        }

        match self.queue.enqueue(&self.cancel, target, message.clone()).await {
            Ok(()) => {
                self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
                info!(
                    "{}: message {} moved from '{}' to dead-letter topic '{}'",
                    self.consumer_id,
                    message.id(),
                    self.topic,
                    target
                );
            }
            Err(e) => warn!(
                "{}: could not dead-letter message {} to '{}': {}",
                self.consumer_id,
                message.id(),
                target,
                e
            ),
        }
    }
}

/// Run the handler, turning a panic into an ordinary handler error
async fn invoke_guarded(
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
    message: Arc<Message>,
) -> HandlerResult {
    match AssertUnwindSafe(handler.handle(cancel, message))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::from(format!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

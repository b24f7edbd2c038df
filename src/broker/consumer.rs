//! Subscription manager
//!
//! A [`QueueConsumer`] owns one polling worker per subscribed topic. The
//! subscription map lives behind a std `Mutex` that is never held across an
//! `.await`: unsubscribe and close take the entries out of the map first and
//! only then wait for the workers to stop.

use crate::broker::config::BrokerConfig;
use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::handler::MessageHandler;
use crate::broker::traits::Consumer;
use crate::broker::worker::{PollingWorker, SubscriptionInfo, WorkerStats};
use crate::core::retry::RetryPolicy;
use crate::core::sync::handle_mutex_poison;
use crate::queue::Queue;
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running worker and the handles needed to stop it
struct Subscription {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    stats: Arc<WorkerStats>,
}

impl Subscription {
    fn signal_stop(&self) {
        self.stats.mark_stopping();
        self.cancel.cancel();
    }

    /// Wait for the worker task; its in-flight handler completes first
    async fn join(self, consumer_id: &str, topic: &str) {
        match self.handle.await {
            Ok(()) => debug!("{}: worker for topic '{}' joined", consumer_id, topic),
            Err(e) if e.is_cancelled() => {
                debug!("{}: worker for topic '{}' was aborted", consumer_id, topic)
            }
            Err(e) => error!(
                "{}: worker for topic '{}' terminated abnormally: {}",
                consumer_id, topic, e
            ),
        }
        self.stats.mark_stopped();
    }
}

#[derive(Default)]
struct ConsumerState {
    subscriptions: HashMap<String, Subscription>,
    closed: bool,
}

/// Consumer managing topic subscriptions over a shared queue
///
/// # Example
///
/// ```rust,no_run
/// # use topicq::broker::{handler_fn, Consumer, QueueConsumer};
/// # use topicq::queue::InMemoryQueue;
/// # use std::sync::Arc;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = Arc::new(InMemoryQueue::new());
/// let consumer = QueueConsumer::new(queue.clone());
///
/// consumer
///     .subscribe("orders", handler_fn(|_cancel, message| async move {
///         println!("Received {}", message.id());
///         Ok(())
///     }))
///     .await?;
///
/// // ... later
/// consumer.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct QueueConsumer {
    consumer_id: String,
    queue: Arc<dyn Queue>,
    poll_interval: Duration,
    retry: RetryPolicy,
    dead_letter_topic: Option<String>,
    state: Mutex<ConsumerState>,
}

impl QueueConsumer {
    /// Consumer with default polling settings
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self::with_config(queue, &BrokerConfig::default())
    }

    /// Consumer taking poll interval, retries and dead-lettering from `config`
    pub fn with_config(queue: Arc<dyn Queue>, config: &BrokerConfig) -> Self {
        Self {
            consumer_id: format!("consumer-{}", uuid::Uuid::new_v4()),
            queue,
            poll_interval: config.poll_interval,
            retry: config.retry_policy(),
            dead_letter_topic: config.dead_letter_topic.clone(),
            state: Mutex::new(ConsumerState::default()),
        }
    }

    pub fn with_id(mut self, consumer_id: impl Into<String>) -> Self {
        self.consumer_id = consumer_id.into();
        self
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.lock_state()
            .map(|state| state.subscriptions.contains_key(topic))
            .unwrap_or(false)
    }

    /// Currently subscribed topics, sorted
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .lock_state()
            .map(|state| state.subscriptions.keys().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Statistics of every active subscription, sorted by topic
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let mut infos: Vec<SubscriptionInfo> = self
            .lock_state()
            .map(|state| {
                state
                    .subscriptions
                    .iter()
                    .map(|(topic, subscription)| subscription.stats.snapshot(topic))
                    .collect()
            })
            .unwrap_or_default();
        infos.sort_by(|a, b| a.topic.cmp(&b.topic));
        infos
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().map(|state| state.closed).unwrap_or(true)
    }

    fn lock_state(&self) -> BrokerResult<MutexGuard<'_, ConsumerState>> {
        handle_mutex_poison(self.state.lock(), |message| BrokerError::Internal {
            message,
        })
    }
}

#[async_trait]
impl Consumer for QueueConsumer {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> BrokerResult<()> {
        let mut state = self.lock_state()?;
        if state.closed {
            return Err(BrokerError::ConsumerClosed);
        }
        if state.subscriptions.contains_key(topic) {
            return Err(BrokerError::AlreadySubscribed {
                topic: topic.to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let stats = Arc::new(WorkerStats::new());
        let worker = PollingWorker {
            consumer_id: self.consumer_id.clone(),
            topic: topic.to_string(),
            queue: Arc::clone(&self.queue),
            handler,
            cancel: cancel.clone(),
            poll_interval: self.poll_interval,
            retry: self.retry.clone(),
            dead_letter_topic: self.dead_letter_topic.clone(),
            stats: Arc::clone(&stats),
        };
        let handle = worker.spawn();

        state.subscriptions.insert(
            topic.to_string(),
            Subscription {
                cancel,
                handle,
                stats,
            },
        );
        info!("{}: subscribed to topic '{}'", self.consumer_id, topic);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> BrokerResult<()> {
        let subscription = {
            let mut state = self.lock_state()?;
            state
                .subscriptions
                .remove(topic)
                .ok_or_else(|| BrokerError::NotSubscribed {
                    topic: topic.to_string(),
                })?
        };

        subscription.signal_stop();
        subscription.join(&self.consumer_id, topic).await;
        info!("{}: unsubscribed from topic '{}'", self.consumer_id, topic);
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        let subscriptions: Vec<(String, Subscription)> = {
            let mut state = self.lock_state()?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.subscriptions.drain().collect()
        };

        debug!(
            "{}: closing, stopping {} worker(s)",
            self.consumer_id,
            subscriptions.len()
        );

        // Signal every worker before waiting on any of them
        for (_, subscription) in &subscriptions {
            subscription.signal_stop();
        }
        let consumer_id = self.consumer_id.as_str();
        join_all(
            subscriptions
                .into_iter()
                .map(|(topic, subscription)| async move {
                    subscription.join(consumer_id, &topic).await
                }),
        )
        .await;

        info!("{}: closed", self.consumer_id);
        Ok(())
    }
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        // Workers of a consumer dropped without close() must not outlive it
        if let Ok(state) = self.state.get_mut() {
            for subscription in state.subscriptions.values() {
                subscription.signal_stop();
            }
        }
    }
}

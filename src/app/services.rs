//! Demo order services
//!
//! [`ProducerService`] publishes a synthetic order on a fixed interval and
//! [`ConsumerService`] subscribes to the same topic and processes them.
//! Both run until their cancellation token fires.

use crate::broker::{BrokerResult, Consumer, HandlerResult, MessageHandler, Producer};
use crate::queue::{Headers, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Orders above this amount are flagged as high value
pub const HIGH_VALUE_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub order_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl OrderData {
    /// The n-th synthetic order: five rotating customers, amount n * 10
    pub fn sample(n: u64) -> Self {
        Self {
            order_id: format!("order-{}", n),
            customer_id: format!("customer-{}", (n % 5) + 1),
            amount: (n * 10) as f64,
            created_at: Utc::now(),
        }
    }

    pub fn is_high_value(&self) -> bool {
        self.amount > HIGH_VALUE_THRESHOLD
    }
}

/// Headers attached to every published order
pub fn order_headers() -> Headers {
    Headers::from([
        ("source".to_string(), "producer-service".to_string()),
        ("message_type".to_string(), "order".to_string()),
        ("version".to_string(), "1.0".to_string()),
    ])
}

pub struct ProducerService {
    producer: Arc<dyn Producer>,
    topic: String,
    interval: Duration,
    published: AtomicU64,
}

impl ProducerService {
    pub fn new(producer: Arc<dyn Producer>, topic: impl Into<String>, interval: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            interval,
            published: AtomicU64::new(0),
        }
    }

    /// Orders published successfully so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Publish one order per interval until `cancel` fires
    ///
    /// Publish failures are logged and the loop carries on with the next
    /// order number.
    pub async fn start(&self, cancel: CancellationToken) -> BrokerResult<()> {
        info!(
            "Producer service publishing to '{}' every {:?}",
            self.topic, self.interval
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_order = 1_u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.publish_order(&cancel, OrderData::sample(next_order)).await;
                    next_order += 1;
                }
            }
        }

        info!("Producer service stopped");
        Ok(())
    }

    async fn publish_order(&self, cancel: &CancellationToken, order: OrderData) {
        let payload = match serde_json::to_vec(&order) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode order {}: {}", order.order_id, e);
                return;
            }
        };

        match self
            .producer
            .publish(cancel, &self.topic, payload, order_headers())
            .await
        {
            Ok(message_id) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Published order: {} (customer: {}, amount: {:.2}, message: {})",
                    order.order_id, order.customer_id, order.amount, message_id
                );
            }
            Err(e) => warn!("Failed to publish order {}: {}", order.order_id, e),
        }
    }

    pub fn stop(&self) -> BrokerResult<()> {
        info!("Stopping producer service");
        self.producer.close()
    }
}

/// Counters updated by the order handler
#[derive(Debug, Default)]
pub struct OrderStats {
    pub processed: AtomicU64,
    pub high_value: AtomicU64,
}

/// Decodes and processes [`OrderData`] messages
pub struct OrderHandler {
    stats: Arc<OrderStats>,
}

impl OrderHandler {
    pub fn new(stats: Arc<OrderStats>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl MessageHandler for OrderHandler {
    async fn handle(&self, _cancel: CancellationToken, message: Arc<Message>) -> HandlerResult {
        debug!(
            "Received message {} from topic '{}' (headers: {:?})",
            message.id(),
            message.topic(),
            message.headers()
        );

        let order: OrderData = serde_json::from_slice(message.payload())?;

        info!(
            "Processing order {}: customer {}, amount ${:.2}, created {}",
            order.order_id,
            order.customer_id,
            order.amount,
            order.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        if order.is_high_value() {
            self.stats.high_value.fetch_add(1, Ordering::Relaxed);
            info!(
                "High-value order detected: {} (amount: ${:.2})",
                order.order_id, order.amount
            );
        }

        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct ConsumerService {
    consumer: Arc<dyn Consumer>,
    topic: String,
    stats: Arc<OrderStats>,
}

impl ConsumerService {
    pub fn new(consumer: Arc<dyn Consumer>, topic: impl Into<String>) -> Self {
        Self {
            consumer,
            topic: topic.into(),
            stats: Arc::new(OrderStats::default()),
        }
    }

    pub fn stats(&self) -> &OrderStats {
        &self.stats
    }

    /// Subscribe to the order topic, then wait until `cancel` fires
    pub async fn start(&self, cancel: CancellationToken) -> BrokerResult<()> {
        let handler = Arc::new(OrderHandler::new(Arc::clone(&self.stats)));
        self.consumer.subscribe(&self.topic, handler).await?;
        info!("Consumer service subscribed to '{}'", self.topic);

        cancel.cancelled().await;
        info!("Consumer service stopped");
        Ok(())
    }

    /// Close the consumer, waiting for in-flight handlers
    pub async fn stop(&self) -> BrokerResult<()> {
        info!("Stopping consumer service");
        self.consumer.close().await
    }
}

//! Tests for unsubscribe, consumer close and two-phase shutdown

#[cfg(test)]
mod tests {
    use crate::broker::tests::{fast_config, wait_until};
    use crate::broker::{
        handler_fn, BrokerConfig, Consumer, MessageHandler, Producer, QueueConsumer,
        QueueProducer,
    };
    use crate::queue::{Headers, InMemoryQueue, Queue, QueueError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;

    /// Handler that takes `delay` per message and records start and finish
    fn slow_handler(
        delay: Duration,
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    ) -> Arc<dyn MessageHandler> {
        handler_fn(move |_cancel, _message| {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                sleep(delay).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn publish(producer: &QueueProducer, topic: &str, count: usize) {
        let cancel = CancellationToken::new();
        for i in 0..count {
            producer
                .publish(&cancel, topic, i.to_string().into_bytes(), Headers::new())
                .await
                .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_waits_for_in_flight_handler() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        consumer
            .subscribe(
                "t",
                slow_handler(
                    Duration::from_millis(200),
                    Arc::clone(&started),
                    Arc::clone(&finished),
                ),
            )
            .await
            .unwrap();
        publish(&producer, "t", 1).await;

        assert!(wait_until(|| started.load(Ordering::SeqCst) == 1).await);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        consumer.close().await.unwrap();
        assert_eq!(
            finished.load(Ordering::SeqCst),
            1,
            "close returns only after the running handler completed"
        );
    }

    #[tokio::test]
    async fn test_no_handler_runs_after_close() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        consumer
            .subscribe(
                "t",
                slow_handler(Duration::ZERO, Arc::clone(&started), Arc::clone(&finished)),
            )
            .await
            .unwrap();
        publish(&producer, "t", 1).await;
        assert!(wait_until(|| finished.load(Ordering::SeqCst) == 1).await);

        consumer.close().await.unwrap();
        publish(&producer, "t", 3).await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(queue.size("t").unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsubscribe_waits_and_cancels_handler_token() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
        let entered = Arc::new(AtomicBool::new(false));
        let saw_cancel = Arc::new(AtomicBool::new(false));

        let (entered_flag, cancel_flag) = (Arc::clone(&entered), Arc::clone(&saw_cancel));
        consumer
            .subscribe(
                "t",
                handler_fn(move |cancel: CancellationToken, _message| {
                    let entered = Arc::clone(&entered_flag);
                    let saw_cancel = Arc::clone(&cancel_flag);
                    async move {
                        entered.store(true, Ordering::SeqCst);
                        // Cooperative handler: return early once cancelled
                        tokio::select! {
                            _ = cancel.cancelled() => saw_cancel.store(true, Ordering::SeqCst),
                            _ = sleep(Duration::from_secs(30)) => {}
                        }
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();
        publish(&producer, "t", 1).await;
        assert!(wait_until(|| entered.load(Ordering::SeqCst)).await);

        timeout(Duration::from_secs(5), consumer.unsubscribe("t"))
            .await
            .expect("unsubscribe should finish once the handler returns")
            .unwrap();

        assert!(saw_cancel.load(Ordering::SeqCst));
        assert!(!consumer.is_subscribed("t"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_phase_shutdown() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        for topic in ["a", "b", "c"] {
            consumer
                .subscribe(
                    topic,
                    slow_handler(
                        Duration::from_millis(20),
                        Arc::clone(&started),
                        Arc::clone(&finished),
                    ),
                )
                .await
                .unwrap();
        }
        for topic in ["a", "b", "c"] {
            publish(&producer, topic, 5).await;
        }
        assert!(wait_until(|| started.load(Ordering::SeqCst) >= 3).await);

        // Phase one: stop every worker
        timeout(Duration::from_secs(5), consumer.close())
            .await
            .expect("consumer close should not hang")
            .unwrap();
        let handled = started.load(Ordering::SeqCst);
        assert_eq!(finished.load(Ordering::SeqCst), handled);

        // Phase two: close the queue, discarding the rest
        queue.close().unwrap();
        assert!(queue.is_closed());
        assert_eq!(queue.dequeue("a"), Err(QueueError::Closed));

        let result = producer
            .publish(&CancellationToken::new(), "a", Vec::new(), Headers::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_worker_survives_queue_close_until_cancelled() {
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
        let started = Arc::new(AtomicUsize::new(0));

        consumer
            .subscribe(
                "t",
                slow_handler(Duration::ZERO, Arc::clone(&started), Arc::new(AtomicUsize::new(0))),
            )
            .await
            .unwrap();

        // Closing the queue first makes every poll fail; workers keep going
        queue.close().unwrap();
        assert!(wait_until(|| consumer.subscriptions()[0].queue_errors >= 2).await);

        consumer.close().await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_workers() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let started = Arc::new(AtomicUsize::new(0));

        {
            let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
            consumer
                .subscribe(
                    "t",
                    slow_handler(Duration::ZERO, Arc::clone(&started), Arc::new(AtomicUsize::new(0))),
                )
                .await
                .unwrap();
        }

        // Let the cancelled worker observe its token
        sleep(Duration::from_millis(30)).await;
        publish(&producer, "t", 2).await;
        sleep(Duration::from_millis(50)).await;

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(queue.size("t").unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsubscribe_during_retry_pause_returns_promptly() {
        let queue = Arc::new(InMemoryQueue::new());
        let producer = QueueProducer::new(queue.clone());
        let config = BrokerConfig {
            handler_attempts: 5,
            handler_retry_delay: Duration::from_millis(500),
            dead_letter_topic: Some("dlq".to_string()),
            ..fast_config()
        };
        let consumer = QueueConsumer::with_config(queue.clone(), &config);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        consumer
            .subscribe(
                "t",
                handler_fn(move |_cancel, _message| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err("always fails".into())
                    }
                }),
            )
            .await
            .unwrap();
        publish(&producer, "t", 1).await;
        assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1).await);

        let started = std::time::Instant::now();
        consumer.unsubscribe("t").await.unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < Duration::from_millis(300),
            "unsubscribe took {:?} while the worker was only pausing",
            elapsed
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Retries were left, so the message is dropped rather than dead-lettered
        assert_eq!(queue.size("dlq").unwrap(), 0);
    }
}

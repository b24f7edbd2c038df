//! Publish-to-handler flow across producers, consumers and topics

use crate::common::{fast_config, wait_until};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use topicq::broker::{handler_fn, Consumer, Producer, QueueConsumer, QueueProducer};
use topicq::queue::{Headers, InMemoryQueue, Message, Queue, QueueError};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_published_order_reaches_handler() {
    let queue = Arc::new(InMemoryQueue::new());
    let producer = QueueProducer::new(queue.clone());
    let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
    let received: Arc<Mutex<Vec<Arc<Message>>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    consumer
        .subscribe(
            "orders",
            handler_fn(move |_cancel, message: Arc<Message>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(message);
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();

    let mut headers = Headers::new();
    headers.insert("message_type".to_string(), "order".to_string());
    let payload = br#"{"order_id":"order-1","amount":250.0}"#.to_vec();
    let id = producer
        .publish(&CancellationToken::new(), "orders", payload.clone(), headers)
        .await
        .unwrap();

    assert!(wait_until(|| !received.lock().unwrap().is_empty()).await);
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id(), id);
        assert_eq!(received[0].topic(), "orders");
        assert_eq!(received[0].payload(), payload.as_slice());
        assert_eq!(received[0].header("message_type"), Some("order"));
    }

    consumer.close().await.unwrap();
    producer.close().unwrap();
    queue.close().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_producers_many_topics_keep_per_topic_order() {
    let queue = Arc::new(InMemoryQueue::new());
    let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
    let seen: Arc<Mutex<HashMap<String, Vec<String>>>> = Arc::new(Mutex::new(HashMap::new()));
    let topics = ["alpha", "beta", "gamma"];

    for topic in topics {
        let seen = Arc::clone(&seen);
        consumer
            .subscribe(
                topic,
                handler_fn(move |_cancel, message: Arc<Message>| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let text = String::from_utf8_lossy(message.payload()).to_string();
                        seen.lock()
                            .unwrap()
                            .entry(message.topic().to_string())
                            .or_default()
                            .push(text);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();
    }

    // One producer per topic, all publishing concurrently
    let mut publishers = Vec::new();
    for topic in topics {
        let producer = QueueProducer::new(queue.clone());
        publishers.push(tokio::spawn(async move {
            let cancel = CancellationToken::new();
            for i in 0..20 {
                producer
                    .publish(&cancel, topic, i.to_string().into_bytes(), Headers::new())
                    .await
                    .unwrap();
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    assert!(
        wait_until(|| {
            let seen = seen.lock().unwrap();
            topics
                .iter()
                .all(|topic| seen.get(*topic).map_or(0, Vec::len) == 20)
        })
        .await
    );
    consumer.close().await.unwrap();

    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    let seen = seen.lock().unwrap();
    for topic in topics {
        assert_eq!(seen[topic], expected, "topic {} out of order", topic);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_phase_shutdown_through_public_api() {
    let queue = Arc::new(InMemoryQueue::new());
    let producer = QueueProducer::new(queue.clone());
    let consumer = QueueConsumer::with_config(queue.clone(), &fast_config());
    let in_flight_done = Arc::new(Mutex::new(false));

    let done = Arc::clone(&in_flight_done);
    consumer
        .subscribe(
            "slow",
            handler_fn(move |_cancel, _message| {
                let done = Arc::clone(&done);
                async move {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    *done.lock().unwrap() = true;
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    for _ in 0..3 {
        producer
            .publish(&cancel, "slow", Vec::new(), Headers::new())
            .await
            .unwrap();
    }
    assert!(wait_until(|| queue.size("slow").unwrap() < 3).await);

    consumer.close().await.unwrap();
    assert!(*in_flight_done.lock().unwrap());

    queue.close().unwrap();
    assert_eq!(queue.topics(), Err(QueueError::Closed));
    assert!(producer
        .publish(&cancel, "slow", Vec::new(), Headers::new())
        .await
        .is_err());
}

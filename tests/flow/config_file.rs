//! Broker settings loaded from TOML files drive queue behaviour

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use topicq::broker::{BrokerConfig, BrokerError, ConfigError, Producer, QueueProducer};
use topicq::queue::{FullPolicy, Headers, InMemoryQueue, Queue, QueueError};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_reject_policy_from_file() {
    let file = config_file("[broker]\ntopic-buffer-capacity = 2\nfull-policy = \"reject\"\n");
    let config = BrokerConfig::from_file(file.path()).unwrap();

    let queue = Arc::new(InMemoryQueue::from_config(&config));
    let producer = QueueProducer::new(queue.clone());
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        producer
            .publish(&cancel, "t", Vec::new(), Headers::new())
            .await
            .unwrap();
    }
    let error = producer
        .publish(&cancel, "t", Vec::new(), Headers::new())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        BrokerError::Queue(QueueError::TopicFull { ref topic, capacity: 2 }) if topic == "t"
    ));
    assert_eq!(queue.size("t").unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_block_policy_from_file_honours_cancellation() {
    let file = config_file("topic-buffer-capacity = 1\nfull-policy = \"BLOCK\"\n");
    let config = BrokerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.full_policy, FullPolicy::Block);

    let queue = Arc::new(InMemoryQueue::from_config(&config));
    let producer = Arc::new(QueueProducer::new(queue.clone()));
    let cancel = CancellationToken::new();
    producer
        .publish(&cancel, "t", Vec::new(), Headers::new())
        .await
        .unwrap();

    let blocked = {
        let producer = Arc::clone(&producer);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            producer
                .publish(&cancel, "t", Vec::new(), Headers::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished());

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), blocked)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(BrokerError::Queue(QueueError::Cancelled { .. }))
    ));
}

#[test]
fn test_invalid_file_is_rejected() {
    let file = config_file("[broker]\nhandler-attempts = 0\n");
    let error = BrokerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(error, ConfigError::InvalidValue { ref key, .. } if key == "handler-attempts"));
}

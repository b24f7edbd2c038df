//! The order demo run end to end

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use topicq::app::cli::config::Settings;
use topicq::app::startup::run;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demo_processes_published_orders() {
    let mut settings = Settings::default();
    settings.topic = "orders".to_string();
    settings.publish_interval = Duration::from_millis(40);
    settings.broker.poll_interval = Duration::from_millis(5);

    let shutdown = CancellationToken::new();
    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            shutdown.cancel();
        })
    };

    let summary = tokio::time::timeout(Duration::from_secs(15), run(&settings, shutdown))
        .await
        .expect("demo should stop once shutdown is requested")
        .unwrap();
    trigger.await.unwrap();

    assert!(summary.published >= 5, "published {}", summary.published);
    assert!(summary.processed > 0);
    assert!(summary.processed <= summary.published);
    // Order n has amount n * 10, so order 11 onwards is high value
    if summary.processed > 10 {
        assert!(summary.high_value > 0);
    }
}

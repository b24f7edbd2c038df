//! Shared helpers for end-to-end tests

use std::time::Duration;
use topicq::broker::BrokerConfig;

pub fn fast_config() -> BrokerConfig {
    BrokerConfig {
        poll_interval: Duration::from_millis(5),
        handler_retry_delay: Duration::from_millis(1),
        ..BrokerConfig::default()
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

//! Test modules for producers, consumers and polling workers

mod shutdown;

use crate::broker::BrokerConfig;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Config with a short poll interval so tests settle quickly
pub(super) fn fast_config() -> BrokerConfig {
    BrokerConfig {
        poll_interval: Duration::from_millis(5),
        handler_retry_delay: Duration::from_millis(1),
        ..BrokerConfig::default()
    }
}

/// Poll `condition` until it holds; false if it did not within 5 seconds
pub(super) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

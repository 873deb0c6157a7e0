//! Catch-up backpressure
//!
//! Before each catch-up request the client checks the deepest downstream
//! queue. Above the high watermark it pauses, rechecking every
//! `wait_interval`, until depth is at or below the low watermark.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use contracts::{NotificationDispatch, ThrottleConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    high_watermark: usize,
    low_watermark: usize,
    wait_interval: Duration,
}

impl Throttle {
    pub fn new(high_watermark: usize, low_watermark: usize, wait_interval: Duration) -> Self {
        Self {
            high_watermark,
            low_watermark: low_watermark.min(high_watermark),
            wait_interval,
        }
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(
            config.high_watermark,
            config.low_watermark,
            Duration::from_millis(config.wait_interval_ms),
        )
    }

    /// Wait until `dispatch` has room for another catch-up batch
    ///
    /// Returns how long it waited. Dropping the future abandons the wait.
    pub async fn wait_for_capacity<D>(self, dispatch: Arc<D>) -> Duration
    where
        D: NotificationDispatch + ?Sized,
    {
        let started = Instant::now();
        match dispatch.max_queue_depth() {
            Some(depth) if depth > self.high_watermark => {
                info!(
                    depth,
                    high_watermark = self.high_watermark,
                    low_watermark = self.low_watermark,
                    "Throttling catch-up until queues drain"
                );
            }
            _ => return Duration::ZERO,
        }

        loop {
            tokio::time::sleep(self.wait_interval).await;
            match dispatch.max_queue_depth() {
                Some(depth) if depth > self.low_watermark => {
                    debug!(depth, "Still throttling");
                }
                _ => break,
            }
        }

        let waited = started.elapsed();
        observability::record_throttle_wait_ms(waited.as_secs_f64() * 1000.0);
        info!(waited_ms = waited.as_millis() as u64, "Done throttling");
        waited
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from_config(&ThrottleConfig::default())
    }
}

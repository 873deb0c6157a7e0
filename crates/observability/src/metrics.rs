//! Notification pipeline metrics
//!
//! Thin helpers over the `metrics` facade so metric names live in one place.

use metrics::{counter, gauge, histogram};

/// Record queue depths for one listener (called by orchestrator housekeeping)
pub fn record_listener_depth(listener: &str, queued: usize, to_retry: usize) {
    gauge!("pdl_notify_listener_queue_depth", "listener" => listener.to_string())
        .set(queued as f64);
    gauge!("pdl_notify_listener_retry_depth", "listener" => listener.to_string())
        .set(to_retry as f64);
}

/// Record one delivery attempt and its latency
pub fn record_delivery(listener: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "pdl_notify_deliveries_total",
        "listener" => listener.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("pdl_notify_delivery_latency_ms", "listener" => listener.to_string())
        .record(latency_ms);
}

/// Record a notification dropped after exhausting its attempts
pub fn record_permanent_failure(listener: &str) {
    counter!("pdl_notify_permanent_failures_total", "listener" => listener.to_string())
        .increment(1);
}

/// Record notifications moved from the error queue back to the primary queue
pub fn record_requeued(listener: &str, count: usize) {
    if count > 0 {
        counter!("pdl_notify_requeued_total", "listener" => listener.to_string())
            .increment(count as u64);
    }
}

/// Record a feed message by action
pub fn record_feed_message(action: &str) {
    counter!("pdl_notify_feed_messages_total", "action" => action.to_string()).increment(1);
}

/// Record a malformed or unrecognized feed message
pub fn record_feed_message_rejected() {
    counter!("pdl_notify_feed_messages_rejected_total").increment(1);
}

/// Record a broadcast sequence gap
pub fn record_broadcast_gap(expected: i64, received: i64) {
    counter!("pdl_notify_broadcast_gaps_total").increment(1);
    histogram!("pdl_notify_broadcast_gap_size").record(received.abs_diff(expected) as f64);
}

/// Record a catch-up request sent to the feed
pub fn record_catch_up_request() {
    counter!("pdl_notify_catch_up_requests_total").increment(1);
}

/// Record the current sync mode (1 = broadcasting, 0 = catching up)
pub fn record_sync_mode(broadcasting: bool) {
    gauge!("pdl_notify_sync_broadcasting").set(if broadcasting { 1.0 } else { 0.0 });
}

/// Record the cursor position as unix seconds
pub fn record_cursor(cursor_unix_secs: i64) {
    gauge!("pdl_notify_sync_cursor_seconds").set(cursor_unix_secs as f64);
}

/// Record time spent paused by catch-up backpressure
pub fn record_throttle_wait_ms(waited_ms: f64) {
    histogram!("pdl_notify_throttle_wait_ms").record(waited_ms);
}

/// Per-listener delivery counters kept in memory for a run summary
#[derive(Debug, Clone, Default)]
pub struct DeliveryTotals {
    pub delivered: u64,
    pub failed_attempts: u64,
    pub dropped: u64,
}

impl DeliveryTotals {
    pub fn attempts(&self) -> u64 {
        self.delivered + self.failed_attempts
    }

    /// Share of attempts that failed, in percent
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            0.0
        } else {
            self.failed_attempts as f64 / attempts as f64 * 100.0
        }
    }
}

impl std::fmt::Display for DeliveryTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivered={}, failed_attempts={} ({:.2}%), dropped={}",
            self.delivered,
            self.failed_attempts,
            self.failure_rate(),
            self.dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_rate() {
        let totals = DeliveryTotals {
            delivered: 3,
            failed_attempts: 1,
            dropped: 0,
        };
        assert_eq!(totals.attempts(), 4);
        assert!((totals.failure_rate() - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_broadcast_gap_at_id_extremes() {
        record_broadcast_gap(i64::MIN, i64::MAX);
        record_broadcast_gap(i64::MAX, i64::MIN);
    }

    #[test]
    fn test_failure_rate_without_attempts() {
        assert_eq!(DeliveryTotals::default().failure_rate(), 0.0);
    }

    #[test]
    fn test_display() {
        let totals = DeliveryTotals {
            delivered: 1,
            failed_attempts: 1,
            dropped: 1,
        };
        let output = totals.to_string();
        assert!(output.contains("delivered=1"));
        assert!(output.contains("50.00%"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_listener_depth("l", 1, 2);
        record_delivery("l", true, 1.5);
        record_broadcast_gap(5, 8);
        record_sync_mode(true);
    }
}

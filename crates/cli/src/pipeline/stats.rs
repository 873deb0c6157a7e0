//! Run statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatcher::MetricsSnapshot;
use feed_sync::SyncMode;
use observability::DeliveryTotals;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Sync mode when the run ended
    pub mode: SyncMode,

    /// Final feed cursor (persisted to the tracking file)
    pub cursor: DateTime<Utc>,

    /// Notifications queued by startup index replay
    pub replayed: usize,

    /// Delivery counters summed over every listener
    pub totals: DeliveryTotals,

    /// Per-listener snapshot, sorted by name
    pub listeners: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Successful deliveries per second
    pub fn delivery_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.totals.delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sync mode: {:?}", self.mode);
        println!("   ├─ Cursor: {}", self.cursor.to_rfc3339());
        println!("   ├─ Index replay: {} notifications", self.replayed);
        println!("   ├─ Deliveries: {}", self.totals);
        println!("   └─ Rate: {:.2}/s", self.delivery_rate());

        if !self.listeners.is_empty() {
            println!("\nListeners ({})", self.listeners.len());
            for (i, (name, snapshot)) in self.listeners.iter().enumerate() {
                let prefix = if i == self.listeners.len() - 1 {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: delivered={}, failures={}, dropped={}, requeued={}, queued={}, retrying={}",
                    prefix,
                    name,
                    snapshot.delivered_count,
                    snapshot.failure_count,
                    snapshot.dropped_count,
                    snapshot.requeued_count,
                    snapshot.queue_len,
                    snapshot.error_queue_len
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_rate() {
        let stats = PipelineStats {
            duration: Duration::from_secs(4),
            mode: SyncMode::Broadcasting,
            cursor: Utc::now(),
            replayed: 0,
            totals: DeliveryTotals {
                delivered: 10,
                failed_attempts: 2,
                dropped: 0,
            },
            listeners: Vec::new(),
        };
        assert!((stats.delivery_rate() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_delivery_rate_zero_duration() {
        let stats = PipelineStats {
            duration: Duration::ZERO,
            mode: SyncMode::CatchingUp,
            cursor: Utc::now(),
            replayed: 3,
            totals: DeliveryTotals::default(),
            listeners: vec![("log".to_string(), MetricsSnapshot::default())],
        };
        assert_eq!(stats.delivery_rate(), 0.0);
    }
}

//! # Integration Tests
//!
//! Cross-crate scenarios:
//! - contract snapshots
//! - feed → dispatcher → listeners end to end
//! - startup reconciliation and retry across the orchestrator

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use chrono::{TimeZone, Utc};
    use contracts::{ConfigVersion, ProductId};

    #[test]
    fn test_config_version_default() {
        assert_eq!(ConfigVersion::default(), ConfigVersion::V1);
    }

    #[test]
    fn test_product_id_urn() {
        let update_time = Utc.timestamp_millis_opt(1_714_557_600_000).unwrap();
        let id = ProductId::new("us", "origin", "us7000abcd", update_time);
        assert_eq!(
            id.to_string(),
            "urn:usgs-product:us:origin:us7000abcd:1714557600000"
        );
    }
}

#[cfg(test)]
mod queue_tests {
    use std::time::Duration;

    use dispatcher::FairQueue;
    use tokio::time::timeout;

    /// One item each under "a", "d", "g": a single consumer sees a, d, g
    #[tokio::test]
    async fn test_single_consumer_drains_in_arrival_order() {
        let queue = FairQueue::new(|item: &String| item.clone());
        for key in ["a", "d", "g"] {
            queue.add(key.to_string());
        }

        let mut drained = Vec::new();
        for _ in 0..3 {
            drained.push(timeout(Duration::from_secs(1), queue.take()).await.unwrap());
        }
        assert_eq!(drained, vec!["a", "d", "g"]);
        assert!(queue.is_empty());
        assert!(queue.remove().is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use contracts::{ListenerConfig, ListenerType, NotifierConfig, ProductFilter};
    use dispatcher::{create_dispatcher, Dispatcher};
    use feed_sync::{SyncMode, TrackingFile};
    use std::collections::HashMap;

    use crate::support::{
        broadcast, catch_up_done, feed_config, product, wait_until, FeedHarness,
        RecordingListener,
    };

    fn file_listener(base: &std::path::Path) -> ListenerConfig {
        ListenerConfig {
            name: "archive".to_string(),
            listener_type: ListenerType::File,
            max_tries: 1,
            retry_delay_ms: 10,
            use_index: false,
            filter: ProductFilter::default(),
            params: HashMap::from([(
                "base_path".to_string(),
                base.display().to_string(),
            )]),
        }
    }

    /// ChannelTransport → FeedSyncClient → Dispatcher → listeners
    #[tokio::test]
    async fn test_feed_to_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        let dispatcher = Arc::new(
            create_dispatcher(
                "e2e",
                &NotifierConfig::default(),
                &[file_listener(&archive)],
            )
            .unwrap(),
        );
        let recorder = RecordingListener::new("recorder");
        let received = recorder.received();
        assert!(dispatcher.add_listener(recorder));

        let mut feed = FeedHarness::start(feed_config(dir.path()), Arc::clone(&dispatcher)).await;

        feed.peer.connect();
        let request = feed.next_request().await;
        assert_eq!(request["created_after"], "2024-05-01T00:00:00Z");

        feed.peer.message(product(1, "p1", "2024-05-01T10:00:01Z"));
        feed.peer.message(product(2, "p2", "2024-05-01T10:00:02Z"));
        feed.peer.message(catch_up_done(0));
        feed.peer.message(broadcast(40, "b40", "2024-05-01T10:00:40Z"));
        feed.peer.message(broadcast(41, "b41", "2024-05-01T10:00:41Z"));

        wait_until(|| received.lock().len() == 4).await;
        assert_eq!(*received.lock(), vec!["p1", "p2", "b40", "b41"]);

        let client = feed.finish().await;
        assert_eq!(client.mode(), SyncMode::Broadcasting);
        let expected: DateTime<Utc> = "2024-05-01T10:00:41Z".parse().unwrap();
        assert_eq!(client.cursor(), expected);

        wait_until(|| dispatcher.delivery_totals().delivered == 8).await;
        let stored = archive
            .join("us")
            .join("origin")
            .join("b41")
            .join(format!("{}.json", expected.timestamp_millis()));
        let text = tokio::fs::read_to_string(&stored).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["product_id"]["code"], "b41");

        let saved = TrackingFile::new(dir.path().join("tracking.json"))
            .read()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.created_after, expected);

        dispatcher.shutdown().await;
        assert_eq!(dispatcher.listener_count(), 0);
    }

    /// A broadcast gap sends the client back to catch-up, which re-delivers
    /// the missed and the gap notifications as historical products
    #[tokio::test]
    async fn test_broadcast_gap_recovered_by_catch_up() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new("e2e", NotifierConfig::default()));
        let recorder = RecordingListener::new("recorder");
        let received = recorder.received();
        dispatcher.add_listener(recorder);

        let mut feed = FeedHarness::start(feed_config(dir.path()), Arc::clone(&dispatcher)).await;

        feed.peer.connect();
        feed.next_request().await;
        feed.peer.message(catch_up_done(0));
        feed.peer.message(broadcast(5, "b5", "2024-05-01T10:00:05Z"));
        feed.peer.message(broadcast(6, "b6", "2024-05-01T10:00:06Z"));
        feed.peer.message(broadcast(9, "b9", "2024-05-01T10:00:09Z"));

        let request = feed.next_request().await;
        assert_eq!(request["created_after"], "2024-05-01T10:00:06Z");

        feed.peer.message(product(7, "b7", "2024-05-01T10:00:07Z"));
        feed.peer.message(product(8, "b8", "2024-05-01T10:00:08Z"));
        feed.peer.message(product(9, "b9", "2024-05-01T10:00:09Z"));
        feed.peer.message(catch_up_done(0));
        feed.peer.message(broadcast(10, "b10", "2024-05-01T10:00:10Z"));

        wait_until(|| received.lock().len() == 6).await;
        assert_eq!(
            *received.lock(),
            vec!["b5", "b6", "b7", "b8", "b9", "b10"]
        );

        let client = feed.finish().await;
        assert_eq!(client.state().last_broadcast_id(), Some(10));
        dispatcher.shutdown().await;
    }

    /// Deep listener queues hold back catch-up until they drain
    #[tokio::test]
    async fn test_slow_listener_throttles_catch_up() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new("e2e", NotifierConfig::default()));
        let recorder = RecordingListener::new("slow").with_delay(Duration::from_millis(20));
        let received = recorder.received();
        dispatcher.add_listener(recorder);

        let mut config = feed_config(dir.path());
        config.throttle.high_watermark = 3;
        config.throttle.low_watermark = 1;
        config.throttle.wait_interval_ms = 5;
        let mut feed = FeedHarness::start(config, Arc::clone(&dispatcher)).await;

        feed.peer.connect();
        feed.next_request().await;
        for i in 1..=8 {
            feed.peer
                .message(product(i, &format!("p{i}"), &format!("2024-05-01T10:00:0{i}Z")));
        }
        feed.peer.message(catch_up_done(8));

        // the follow-up request waits for the queue to drain
        let request = feed.next_request().await;
        assert_eq!(request["created_after"], "2024-05-01T10:00:08Z");
        assert!(dispatcher.max_queue_depth().unwrap() <= 1);
        assert!(received.lock().len() >= 6);

        feed.finish().await;
        dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod orchestrator_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use contracts::{ContentRef, Notification, NotifierConfig, ProductId};
    use dispatcher::{Dispatcher, MemoryNotificationIndex};

    use crate::support::{wait_until, RecordingListener};

    fn notification(code: &str) -> Notification {
        let now = Utc::now();
        Notification::new(
            ProductId::new("us", "origin", code, now),
            now,
            ContentRef::Url(format!("https://example.org/{code}")),
        )
    }

    #[tokio::test]
    async fn test_startup_reconciliation_once_per_dispatcher() {
        let index = MemoryNotificationIndex::new("main");
        for code in ["n1", "n2", "n3"] {
            index.add(notification(code));
        }

        let dispatcher = Dispatcher::new("first", NotifierConfig::default());
        let indexer = RecordingListener::new("indexer").with_index();
        let indexed = indexer.received();
        let plain = RecordingListener::new("plain");
        let unindexed = plain.received();
        dispatcher.add_listener(indexer);
        dispatcher.add_listener(plain);

        assert_eq!(dispatcher.startup(&index).await.unwrap(), 3);
        wait_until(|| indexed.lock().len() == 3).await;
        assert_eq!(*indexed.lock(), vec!["n1", "n2", "n3"]);
        assert!(unindexed.lock().is_empty());
        assert!(dispatcher.is_reconciled("main", "indexer"));
        assert!(!dispatcher.is_reconciled("main", "plain"));

        // already reconciled
        assert_eq!(dispatcher.requeue(&index).await.unwrap(), 0);
        dispatcher.shutdown().await;

        // a new orchestrator starts with an empty record
        let second = Dispatcher::new("second", NotifierConfig::default());
        let indexer = RecordingListener::new("indexer").with_index();
        let replayed = indexer.received();
        second.add_listener(indexer);
        assert!(!second.is_reconciled("main", "indexer"));
        assert_eq!(second.requeue(&index).await.unwrap(), 3);
        wait_until(|| replayed.lock().len() == 3).await;
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_housekeeping_retries_failed_delivery() {
        let dispatcher = Dispatcher::new(
            "retry",
            NotifierConfig {
                status_interval_ms: 10,
            },
        );
        let flaky = RecordingListener::new("flaky")
            .failing_first(1)
            .with_retry(2, Duration::from_millis(30));
        let attempts = flaky.received();
        dispatcher.add_listener(flaky);
        dispatcher.start_housekeeping();

        assert_eq!(dispatcher.notify_listeners(Arc::new(notification("q1"))), 1);

        wait_until(|| dispatcher.delivery_totals().delivered == 1).await;
        assert_eq!(*attempts.lock(), vec!["q1", "q1"]);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.len(), 1);
        let (name, snapshot) = &metrics[0];
        assert_eq!(name, "flaky");
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.requeued_count, 1);
        assert_eq!(snapshot.dropped_count, 0);
        assert_eq!(snapshot.error_queue_len, 0);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_listener_without_retries_drops_failure() {
        let dispatcher = Dispatcher::new("drop", NotifierConfig::default());
        let broken = RecordingListener::new("broken").failing_first(u32::MAX);
        dispatcher.add_listener(broken);

        dispatcher.notify_listeners(Arc::new(notification("x")));
        wait_until(|| dispatcher.delivery_totals().dropped == 1).await;

        let totals = dispatcher.delivery_totals();
        assert_eq!(totals.delivered, 0);
        assert_eq!(totals.failed_attempts, 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_config_listeners_loaded_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            r#"
[feed]
url = "127.0.0.1:4222"
cluster_id = "c"
subject = "anss.pdl.realtime"

[notifier]
status_interval_ms = 1000

[[listeners]]
name = "logger"
listener_type = "log"

[[listeners]]
name = "archive"
listener_type = "file"
max_tries = 3
retry_delay_ms = 100
params = {{ base_path = "{}" }}
"#,
            dir.path().display()
        );
        let config =
            config_loader::ConfigLoader::load_from_str(&text, config_loader::ConfigFormat::Toml)
                .unwrap();

        let dispatcher =
            dispatcher::create_dispatcher("cfg", &config.notifier, &config.listeners).unwrap();
        assert_eq!(dispatcher.listener_names(), vec!["archive", "logger"]);
        assert_eq!(dispatcher.max_queue_depth(), Some(0));
        dispatcher.shutdown().await;
    }
}

//! Shared fixtures: a recording listener and a feed client harness.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, FeedConfig, Notification, NotificationListener, ThrottleConfig};
use dispatcher::Dispatcher;
use feed_sync::{ChannelPeer, ChannelTransport, FeedError, FeedSyncClient, TrackingData, TrackingFile};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub type Received = Arc<Mutex<Vec<String>>>;

/// Listener that records the product code of every delivery attempt
pub struct RecordingListener {
    name: String,
    received: Received,
    use_index: bool,
    max_tries: u32,
    retry_delay: Duration,
    fail_first: u32,
    failures: AtomicU32,
    delay: Duration,
}

impl RecordingListener {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            received: Arc::default(),
            use_index: false,
            max_tries: 1,
            retry_delay: Duration::ZERO,
            fail_first: 0,
            failures: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn received(&self) -> Received {
        Arc::clone(&self.received)
    }

    pub fn with_index(mut self) -> Self {
        self.use_index = true;
        self
    }

    pub fn with_retry(mut self, max_tries: u32, retry_delay: Duration) -> Self {
        self.max_tries = max_tries;
        self.retry_delay = retry_delay;
        self
    }

    /// Fail the first `count` attempts
    pub fn failing_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    /// Take this long per delivery
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl NotificationListener for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_tries(&self) -> u32 {
        self.max_tries
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn uses_notification_index(&self) -> bool {
        self.use_index
    }

    async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError> {
        self.received
            .lock()
            .push(notification.product_id.code.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failures.load(Ordering::SeqCst) < self.fail_first {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ContractError::listener_delivery(&self.name, "not yet"));
        }
        Ok(())
    }
}

/// Feed settings pointing the tracking file into `dir`
pub fn feed_config(dir: &Path) -> FeedConfig {
    FeedConfig {
        url: "tcp://feed.test:9000".into(),
        cluster_id: "cluster".into(),
        client_id: None,
        subject: "products".into(),
        tracking_file: dir.join("tracking.json"),
        tracking_interval_ms: 50,
        initial_catch_up_age_days: 7.0,
        catch_up_timeout_ms: 60_000,
        connect_attempts: 1,
        connect_timeout_ms: 100,
        throttle: ThrottleConfig {
            high_watermark: 1_000,
            low_watermark: 500,
            wait_interval_ms: 10,
        },
    }
}

fn notification_frame(action: &str, id: i64, code: &str, created: &str) -> String {
    serde_json::json!({
        "action": action,
        "notification": {
            "id": id,
            "created": created,
            "product": {
                "id": {
                    "source": "us",
                    "type": "origin",
                    "code": code,
                    "updateTime": created,
                }
            }
        }
    })
    .to_string()
}

pub fn broadcast(id: i64, code: &str, created: &str) -> String {
    notification_frame("broadcast", id, code, created)
}

pub fn product(id: i64, code: &str, created: &str) -> String {
    notification_frame("product", id, code, created)
}

pub fn catch_up_done(count: u64) -> String {
    serde_json::json!({
        "action": "products_created_after",
        "created_after": "2024-05-01T00:00:00Z",
        "count": count,
    })
    .to_string()
}

/// Poll `condition` every 5 ms for up to 3 s
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..600 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

type ClientTask = JoinHandle<(FeedSyncClient<Dispatcher>, Result<(), FeedError>)>;

/// Feed client running over a [`ChannelTransport`]
pub struct FeedHarness {
    pub peer: ChannelPeer,
    stop: watch::Sender<bool>,
    task: ClientTask,
}

impl FeedHarness {
    /// Start a client resuming from 2024-05-01T00:00:00Z
    pub async fn start(config: FeedConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let start = "2024-05-01T00:00:00Z".parse().unwrap();
        TrackingFile::new(&config.tracking_file)
            .write(&TrackingData::for_config(&config, start))
            .await
            .unwrap();

        let mut client = FeedSyncClient::new(config, dispatcher).await.unwrap();
        assert_eq!(client.cursor(), start);

        let (mut transport, peer) = ChannelTransport::pair();
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let result = client.run(&mut transport, stop_rx).await;
            (client, result)
        });
        Self { peer, stop, task }
    }

    pub async fn next_request(&mut self) -> serde_json::Value {
        let sent = timeout(Duration::from_secs(3), self.peer.next_sent())
            .await
            .expect("no request sent")
            .expect("transport closed");
        serde_json::from_str(&sent).unwrap()
    }

    /// Stop the client and return it once its run loop has exited
    pub async fn finish(self) -> FeedSyncClient<Dispatcher> {
        self.stop.send(true).unwrap();
        let (client, result) = timeout(Duration::from_secs(3), self.task)
            .await
            .unwrap()
            .unwrap();
        result.unwrap();
        client
    }
}

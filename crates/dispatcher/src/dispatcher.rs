//! Dispatcher - fans notifications out to listener workers
//!
//! Owns one [`ListenerWorker`] per listener, runs the periodic housekeeping
//! task that moves retry-ready notifications back into primary queues, and
//! replays a notification index to listeners that ask for it at startup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

use contracts::{
    IndexQuery, ListenerConfig, Notification, NotificationDispatch, NotificationIndex,
    NotificationListener, NotifierConfig,
};
use observability::DeliveryTotals;

use crate::error::DispatcherError;
use crate::listeners::listener_from_config;
use crate::metrics::MetricsSnapshot;
use crate::worker::ListenerWorker;

const MIN_STATUS_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

type WorkerMap = Arc<RwLock<HashMap<String, Arc<ListenerWorker>>>>;

struct Housekeeping {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The orchestrator that fans notifications out to listener workers
pub struct Dispatcher {
    name: String,
    config: NotifierConfig,
    workers: WorkerMap,
    /// (index name, listener name) pairs already replayed by this dispatcher
    reconciled: Mutex<HashSet<(String, String)>>,
    housekeeping: Mutex<Option<Housekeeping>>,
}

impl Dispatcher {
    pub fn new(name: impl Into<String>, config: NotifierConfig) -> Self {
        Self {
            name: name.into(),
            config,
            workers: Arc::new(RwLock::new(HashMap::new())),
            reconciled: Mutex::new(HashSet::new()),
            housekeeping: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a listener and start its worker
    ///
    /// Returns false if a listener with the same name is already registered.
    pub fn add_listener<L>(&self, listener: L) -> bool
    where
        L: NotificationListener + Sync + 'static,
    {
        let name = listener.name().to_string();
        let mut workers = self.workers.write();
        if workers.contains_key(&name) {
            debug!(dispatcher = %self.name, listener = %name, "Listener already registered");
            return false;
        }

        let worker = ListenerWorker::spawn(listener);
        info!(
            dispatcher = %self.name,
            listener = %name,
            max_tries = worker.max_tries(),
            retry_delay_ms = worker.retry_delay().as_millis() as u64,
            "Listener added"
        );
        workers.insert(name, Arc::new(worker));
        true
    }

    /// Stop and discard a listener's worker
    ///
    /// Pending notifications for that listener are discarded with it.
    #[instrument(name = "dispatcher_remove_listener", skip(self))]
    pub async fn remove_listener(&self, name: &str) -> bool {
        let removed = self.workers.write().remove(name);
        match removed {
            Some(worker) => {
                worker.shutdown().await;
                info!(dispatcher = %self.name, listener = %name, "Listener removed");
                true
            }
            None => false,
        }
    }

    /// Hand a notification to every worker
    ///
    /// Returns how many listeners queued it. Never blocks on a worker.
    pub fn notify_listeners(&self, notification: Arc<Notification>) -> usize {
        self.worker_list()
            .iter()
            .filter(|worker| worker.notify(Arc::clone(&notification)))
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.workers.read().len()
    }

    pub fn listener_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.workers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Largest primary-queue depth across listeners
    pub fn max_queue_depth(&self) -> Option<usize> {
        self.workers.read().values().map(|w| w.queue_len()).max()
    }

    /// Get metrics for all listeners
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut metrics: Vec<_> = self
            .worker_list()
            .iter()
            .map(|w| (w.name().to_string(), w.snapshot()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    /// Delivery counters summed across listeners
    pub fn delivery_totals(&self) -> DeliveryTotals {
        self.worker_list()
            .iter()
            .fold(DeliveryTotals::default(), |mut totals, worker| {
                let m = worker.metrics();
                totals.delivered += m.delivered_count();
                totals.failed_attempts += m.failure_count();
                totals.dropped += m.dropped_count();
                totals
            })
    }

    /// One housekeeping pass: requeue retry-ready notifications and
    /// report queue depths
    pub fn housekeep(&self) {
        housekeep(&self.name, &self.workers);
    }

    /// Start the periodic housekeeping task (no-op when already running)
    pub fn start_housekeeping(&self) {
        let mut housekeeping = self.housekeeping.lock();
        if housekeeping.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(housekeeping_loop(
            self.name.clone(),
            Arc::clone(&self.workers),
            self.config.status_interval().max(MIN_STATUS_INTERVAL),
            stop_rx,
        ));
        *housekeeping = Some(Housekeeping { stop_tx, task });
    }

    /// Start housekeeping, then replay `index` to listeners that use it
    pub async fn startup<I>(&self, index: &I) -> Result<usize, DispatcherError>
    where
        I: NotificationIndex + Sync,
    {
        self.start_housekeeping();
        self.requeue(index).await
    }

    /// Replay every indexed notification to listeners that keep their own
    /// record of processed notifications
    ///
    /// Each (index, listener) pair is replayed at most once per dispatcher.
    /// Returns the number of notifications queued.
    #[instrument(
        name = "dispatcher_requeue",
        skip(self, index),
        fields(dispatcher = %self.name, index = %index.name())
    )]
    pub async fn requeue<I>(&self, index: &I) -> Result<usize, DispatcherError>
    where
        I: NotificationIndex + Sync,
    {
        let index_name = index.name().to_string();
        let pending: Vec<Arc<ListenerWorker>> = {
            let reconciled = self.reconciled.lock();
            self.worker_list()
                .into_iter()
                .filter(|w| w.uses_notification_index())
                .filter(|w| !reconciled.contains(&(index_name.clone(), w.name().to_string())))
                .collect()
        };

        if pending.is_empty() {
            debug!(index = %index_name, "No listeners need reconciliation");
            return Ok(0);
        }

        let notifications: Vec<Arc<Notification>> = index
            .find_notifications(&IndexQuery::all())
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();

        let mut queued = 0;
        for worker in pending {
            let count = notifications
                .iter()
                .filter(|n| worker.notify(Arc::clone(n)))
                .count();
            self.reconciled
                .lock()
                .insert((index_name.clone(), worker.name().to_string()));
            info!(
                index = %index_name,
                listener = %worker.name(),
                notifications = count,
                "Replayed notification index"
            );
            queued += count;
        }

        Ok(queued)
    }

    /// Whether `listener` has been replayed `index_name` already
    pub fn is_reconciled(&self, index_name: &str, listener: &str) -> bool {
        self.reconciled
            .lock()
            .contains(&(index_name.to_string(), listener.to_string()))
    }

    /// Stop housekeeping and every worker, waiting for them to exit
    #[instrument(name = "dispatcher_shutdown", skip(self), fields(dispatcher = %self.name))]
    pub async fn shutdown(&self) {
        let housekeeping = self.housekeeping.lock().take();
        if let Some(housekeeping) = housekeeping {
            let _ = housekeeping.stop_tx.send(true);
            if let Err(e) = housekeeping.task.await {
                error!(dispatcher = %self.name, error = ?e, "Housekeeping task panicked");
            }
        }

        let workers: Vec<_> = self.workers.write().drain().map(|(_, w)| w).collect();
        for worker in workers {
            worker.shutdown().await;
        }

        info!(dispatcher = %self.name, "Dispatcher shutdown complete");
    }

    fn worker_list(&self) -> Vec<Arc<ListenerWorker>> {
        self.workers.read().values().cloned().collect()
    }
}

impl NotificationDispatch for Dispatcher {
    fn dispatch(&self, notification: Arc<Notification>) {
        self.notify_listeners(notification);
    }

    fn max_queue_depth(&self) -> Option<usize> {
        Dispatcher::max_queue_depth(self)
    }
}

fn housekeep(dispatcher: &str, workers: &WorkerMap) {
    let workers: Vec<_> = workers.read().values().cloned().collect();
    for worker in workers {
        let requeued = worker.requeue_errors();
        if requeued > 0 {
            observability::record_requeued(worker.name(), requeued);
        }

        let queued = worker.queue_len();
        let to_retry = worker.error_queue_len();
        observability::record_listener_depth(worker.name(), queued, to_retry);
        debug!(
            dispatcher = %dispatcher,
            listener = %worker.name(),
            queued,
            to_retry,
            requeued,
            "Listener queue status"
        );
    }
}

#[instrument(name = "dispatcher_housekeeping", skip(workers, stop_rx))]
async fn housekeeping_loop(
    dispatcher: String,
    workers: WorkerMap,
    interval: std::time::Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => housekeep(&dispatcher, &workers),
        }
    }

    debug!(dispatcher = %dispatcher, "Housekeeping stopped");
}

/// Convenience function to create a dispatcher from listener configs
#[instrument(
    name = "dispatcher_create",
    skip(config, listeners),
    fields(listener_count = listeners.len())
)]
pub fn create_dispatcher(
    name: &str,
    config: &NotifierConfig,
    listeners: &[ListenerConfig],
) -> Result<Dispatcher, DispatcherError> {
    let dispatcher = Dispatcher::new(name, config.clone());
    for listener_config in listeners {
        let listener = listener_from_config(listener_config)
            .map_err(|e| DispatcherError::listener_creation(&listener_config.name, e.to_string()))?;
        if !dispatcher.add_listener(listener) {
            return Err(DispatcherError::listener_creation(
                &listener_config.name,
                "duplicate listener name",
            ));
        }
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryNotificationIndex;
    use chrono::Utc;
    use contracts::{ContentRef, ContractError, ListenerType, ProductFilter, ProductId};
    use std::time::Duration;
    use tokio::time::sleep;

    struct RecordingListener {
        name: String,
        uses_index: bool,
        fail: bool,
        retry_delay: Duration,
        received: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingListener {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                uses_index: false,
                fail: false,
                retry_delay: Duration::ZERO,
                received: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl NotificationListener for RecordingListener {
        fn name(&self) -> &str {
            &self.name
        }

        fn max_tries(&self) -> u32 {
            2
        }

        fn retry_delay(&self) -> Duration {
            self.retry_delay
        }

        fn uses_notification_index(&self) -> bool {
            self.uses_index
        }

        async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError> {
            self.received
                .lock()
                .push(notification.product_id.code.clone());
            if self.fail {
                return Err(ContractError::listener_delivery(&self.name, "refused"));
            }
            Ok(())
        }
    }

    fn notification(code: &str) -> Notification {
        let now = Utc::now();
        Notification::new(
            ProductId::new("us", "origin", code, now),
            now,
            ContentRef::Url(format!("https://example.org/{code}")),
        )
    }

    fn notifier_config(status_interval_ms: u64) -> NotifierConfig {
        NotifierConfig { status_interval_ms }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        let first = RecordingListener::new("first");
        let second = RecordingListener::new("second");
        let first_rx = Arc::clone(&first.received);
        let second_rx = Arc::clone(&second.received);
        assert!(dispatcher.add_listener(first));
        assert!(dispatcher.add_listener(second));

        for code in ["a", "b"] {
            assert_eq!(dispatcher.notify_listeners(Arc::new(notification(code))), 2);
        }

        wait_until(|| first_rx.lock().len() == 2 && second_rx.lock().len() == 2).await;
        assert_eq!(dispatcher.delivery_totals().delivered, 4);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_listener_is_ignored() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        assert!(dispatcher.add_listener(RecordingListener::new("same")));
        assert!(!dispatcher.add_listener(RecordingListener::new("same")));
        assert_eq!(dispatcher.listener_count(), 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        dispatcher.add_listener(RecordingListener::new("gone"));

        assert!(dispatcher.remove_listener("gone").await);
        assert!(!dispatcher.remove_listener("gone").await);
        assert_eq!(dispatcher.notify_listeners(Arc::new(notification("a"))), 0);
        assert_eq!(dispatcher.max_queue_depth(), None);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stall_others() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        let mut broken = RecordingListener::new("broken");
        broken.fail = true;
        broken.retry_delay = Duration::from_secs(3600);
        let healthy = RecordingListener::new("healthy");
        let healthy_rx = Arc::clone(&healthy.received);
        dispatcher.add_listener(broken);
        dispatcher.add_listener(healthy);

        for code in ["a", "b", "c"] {
            dispatcher.notify_listeners(Arc::new(notification(code)));
        }

        wait_until(|| healthy_rx.lock().len() == 3).await;
        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].0, "broken");
        wait_until(|| dispatcher.metrics()[0].1.error_queue_len == 3).await;

        // retry delay not reached, nothing moves
        dispatcher.housekeep();
        assert_eq!(dispatcher.metrics()[0].1.error_queue_len, 3);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_housekeeping_retries_failures() {
        let dispatcher = Dispatcher::new("test", notifier_config(10));
        let mut flaky = RecordingListener::new("flaky");
        flaky.fail = true;
        let received = Arc::clone(&flaky.received);
        dispatcher.add_listener(flaky);
        dispatcher.start_housekeeping();

        dispatcher.notify_listeners(Arc::new(notification("a")));

        // max_tries = 2: first attempt, then one retry from housekeeping
        wait_until(|| dispatcher.delivery_totals().dropped == 1).await;
        assert_eq!(received.lock().len(), 2);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_requeue_replays_index_once() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        let mut indexed = RecordingListener::new("indexed");
        indexed.uses_index = true;
        let indexed_rx = Arc::clone(&indexed.received);
        let plain = RecordingListener::new("plain");
        let plain_rx = Arc::clone(&plain.received);
        dispatcher.add_listener(indexed);
        dispatcher.add_listener(plain);

        let index = MemoryNotificationIndex::new("memory");
        for code in ["a", "b", "c"] {
            index.add(notification(code));
        }

        assert_eq!(dispatcher.requeue(&index).await.unwrap(), 3);
        assert!(dispatcher.is_reconciled("memory", "indexed"));
        assert!(!dispatcher.is_reconciled("memory", "plain"));

        // second call within the same dispatcher is a no-op
        assert_eq!(dispatcher.requeue(&index).await.unwrap(), 0);

        wait_until(|| indexed_rx.lock().len() == 3).await;
        assert_eq!(*indexed_rx.lock(), vec!["a", "b", "c"]);
        assert!(plain_rx.lock().is_empty());
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_reconciliation_is_per_dispatcher() {
        let index = MemoryNotificationIndex::new("memory");
        index.add(notification("a"));

        for _ in 0..2 {
            let dispatcher = Dispatcher::new("test", NotifierConfig::default());
            let mut indexed = RecordingListener::new("indexed");
            indexed.uses_index = true;
            dispatcher.add_listener(indexed);
            assert_eq!(dispatcher.startup(&index).await.unwrap(), 1);
            dispatcher.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_max_queue_depth() {
        let dispatcher = Dispatcher::new("test", NotifierConfig::default());
        assert_eq!(dispatcher.max_queue_depth(), None);

        dispatcher.add_listener(RecordingListener::new("only"));
        wait_until(|| dispatcher.max_queue_depth() == Some(0)).await;
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let configs = vec![ListenerConfig {
            name: "test_log".to_string(),
            listener_type: ListenerType::Log,
            max_tries: 1,
            retry_delay_ms: 1000,
            use_index: false,
            filter: ProductFilter::default(),
            params: HashMap::new(),
        }];

        let dispatcher = create_dispatcher("configured", &NotifierConfig::default(), &configs).unwrap();
        assert_eq!(dispatcher.listener_names(), vec!["test_log"]);

        dispatcher.dispatch(Arc::new(notification("a")));
        wait_until(|| dispatcher.delivery_totals().delivered == 1).await;
        dispatcher.shutdown().await;
    }
}

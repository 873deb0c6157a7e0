//! ListenerWorker - one listener with its own fair queue, retry queue and task
//!
//! `notify` enqueues, a dedicated task delivers one notification at a time,
//! and failed deliveries wait in the error queue until the orchestrator's
//! housekeeping moves them back with [`ListenerWorker::requeue_errors`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, Notification, NotificationListener, ProductId};

use crate::fair_queue::FairQueue;
use crate::metrics::{MetricsSnapshot, WorkerMetrics};

/// A notification on its way to one listener
#[derive(Debug, Clone)]
pub struct Envelope {
    pub notification: Arc<Notification>,
    /// Delivery attempts so far
    pub attempts: u32,
    /// When the last failed attempt happened
    pub last_attempt: Option<Instant>,
}

impl Envelope {
    pub fn new(notification: Arc<Notification>) -> Self {
        Self {
            notification,
            attempts: 0,
            last_attempt: None,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.notification.product_id
    }

    /// Whether `retry_delay` has passed since the last attempt
    fn ready_for_retry(&self, retry_delay: Duration, now: Instant) -> bool {
        self.last_attempt
            .is_none_or(|last| last + retry_delay <= now)
    }
}

/// Partition key: `lowercase(source) + "_" + lowercase(type)`
pub fn queue_key(envelope: &Envelope) -> String {
    let id = envelope.product_id();
    format!("{}_{}", id.source, id.product_type).to_lowercase()
}

type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ContractError>> + Send + 'a>>;

/// Object-safe view of a [`NotificationListener`]
trait ErasedListener: Send + Sync {
    fn accept(&self, product_id: &ProductId) -> bool;
    fn deliver<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a>;
}

impl<L> ErasedListener for L
where
    L: NotificationListener + Sync,
{
    fn accept(&self, product_id: &ProductId) -> bool {
        <L as NotificationListener>::accept(self, product_id)
    }

    fn deliver<'a>(&'a self, notification: &'a Notification) -> DeliveryFuture<'a> {
        Box::pin(<L as NotificationListener>::on_notification(self, notification))
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Handle to a listener and its delivery task
pub struct ListenerWorker {
    name: String,
    max_tries: u32,
    retry_delay: Duration,
    uses_index: bool,
    listener: Arc<dyn ErasedListener>,
    queue: Arc<FairQueue<Envelope>>,
    errors: Arc<Mutex<VecDeque<Envelope>>>,
    metrics: Arc<WorkerMetrics>,
    running: Mutex<Option<Running>>,
}

impl ListenerWorker {
    /// Wrap a listener; the delivery task starts with [`start`](Self::start)
    pub fn new<L>(listener: L) -> Self
    where
        L: NotificationListener + Sync + 'static,
    {
        let name = listener.name().to_string();
        let max_tries = listener.max_tries().max(1);
        let retry_delay = listener.retry_delay();
        let uses_index = listener.uses_notification_index();

        Self {
            name,
            max_tries,
            retry_delay,
            uses_index,
            listener: Arc::new(listener),
            queue: Arc::new(FairQueue::new(queue_key)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            metrics: Arc::new(WorkerMetrics::new()),
            running: Mutex::new(None),
        }
    }

    /// Create and start a worker
    pub fn spawn<L>(listener: L) -> Self
    where
        L: NotificationListener + Sync + 'static,
    {
        let worker = Self::new(listener);
        worker.start();
        worker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn uses_notification_index(&self) -> bool {
        self.uses_index
    }

    /// Pending notifications in the primary queue
    pub fn queue_len(&self) -> usize {
        self.queue.size()
    }

    /// Notifications waiting to be retried
    pub fn error_queue_len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            error_queue_len: self.error_queue_len(),
            delivered_count: self.metrics.delivered_count(),
            failure_count: self.metrics.failure_count(),
            dropped_count: self.metrics.dropped_count(),
            requeued_count: self.metrics.requeued_count(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Queue a notification if the listener accepts its product
    ///
    /// Returns false when the listener filtered it out. Never blocks.
    pub fn notify(&self, notification: Arc<Notification>) -> bool {
        if !self.listener.accept(&notification.product_id) {
            return false;
        }
        self.queue.add(Envelope::new(notification));
        true
    }

    /// Move retry-ready notifications from the error queue to the primary queue
    ///
    /// Only the head is checked: the error queue is in failure order, so
    /// once the head is not ready nothing behind it is.
    pub fn requeue_errors(&self) -> usize {
        let now = Instant::now();
        let mut moved = 0;
        {
            let mut errors = self.errors.lock();
            while errors
                .front()
                .is_some_and(|head| head.ready_for_retry(self.retry_delay, now))
            {
                if let Some(envelope) = errors.pop_front() {
                    self.queue.add(envelope);
                    moved += 1;
                }
            }
        }
        self.metrics.add_requeued_count(moved);
        moved
    }

    /// Start the delivery task (no-op when already running)
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(worker_loop(
            Arc::clone(&self.listener),
            Arc::clone(&self.queue),
            Arc::clone(&self.errors),
            Arc::clone(&self.metrics),
            self.name.clone(),
            self.max_tries,
            stop_rx,
        ));

        *running = Some(Running { stop_tx, task });
    }

    /// Signal the delivery task to stop (no-op when not running)
    ///
    /// A delivery in flight is abandoned without retry bookkeeping.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            let _ = running.stop_tx.send(true);
        }
    }

    /// Stop the delivery task and wait for it to exit
    #[instrument(name = "listener_worker_shutdown", skip(self), fields(listener = %self.name))]
    pub async fn shutdown(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            let _ = running.stop_tx.send(true);
            if let Err(e) = running.task.await {
                error!(listener = %self.name, error = ?e, "Worker task panicked");
            }
        }
        debug!(listener = %self.name, "ListenerWorker shutdown complete");
    }
}

impl Drop for ListenerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Delivery task: take, attempt, route failures to the error queue
#[instrument(
    name = "listener_worker_loop",
    skip(listener, queue, errors, metrics, stop_rx),
    fields(listener = %name)
)]
async fn worker_loop(
    listener: Arc<dyn ErasedListener>,
    queue: Arc<FairQueue<Envelope>>,
    errors: Arc<Mutex<VecDeque<Envelope>>>,
    metrics: Arc<WorkerMetrics>,
    name: String,
    max_tries: u32,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!(listener = %name, "Listener worker started");

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let mut envelope = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            envelope = queue.take() => envelope,
        };

        envelope.attempts += 1;
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            result = listener.deliver(&envelope.notification) => result,
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                metrics.inc_delivered_count();
                observability::record_delivery(&name, true, elapsed_ms);
                debug!(
                    listener = %name,
                    product = %envelope.product_id(),
                    elapsed_ms,
                    "Processed notification"
                );
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_delivery(&name, false, elapsed_ms);

                if envelope.attempts < max_tries {
                    debug!(
                        listener = %name,
                        product = %envelope.product_id(),
                        attempts = envelope.attempts,
                        max_tries,
                        error = %e,
                        "Delivery failed, will retry"
                    );
                    envelope.last_attempt = Some(Instant::now());
                    errors.lock().push_back(envelope);
                } else {
                    metrics.inc_dropped_count();
                    observability::record_permanent_failure(&name);
                    warn!(
                        listener = %name,
                        product = %envelope.product_id(),
                        attempts = envelope.attempts,
                        error = %e,
                        "Unable to process notification, giving up"
                    );
                }
            }
        }
    }

    debug!(listener = %name, "Listener worker stopped");
}

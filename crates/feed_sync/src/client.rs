//! FeedSyncClient - drives the catch-up / broadcast protocol over a transport
//!
//! One task owns the client. It reacts to transport events, sends catch-up
//! requests once the backpressure gate opens, re-sends requests that got
//! no answer, and periodically persists the cursor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use contracts::{ContractError, FeedConfig, NotificationDispatch};

use crate::error::FeedError;
use crate::message::CatchUpRequest;
use crate::state::{SyncAction, SyncMode, SyncState};
use crate::throttle::Throttle;
use crate::tracking::{TrackingData, TrackingFile};
use crate::transport::{FeedEvent, FeedTransport};

/// Wait before retrying a catch-up request that could not be sent
const SEND_RETRY_DELAY: Duration = Duration::from_secs(1);

type GateFuture = Pin<Box<dyn Future<Output = Duration> + Send>>;

/// Effect of one transport event on the pending catch-up request
enum CatchUp {
    Unchanged,
    /// Request (again) once the gate opens
    Schedule,
    /// Response received, nothing to re-send
    Answered,
    /// Connection gone, drop anything pending
    Cancel,
}

/// Feed client for one connection identity
pub struct FeedSyncClient<D: NotificationDispatch + ?Sized> {
    config: FeedConfig,
    dispatch: Arc<D>,
    state: SyncState,
    throttle: Throttle,
    tracking: TrackingFile,
    persisted_cursor: Option<DateTime<Utc>>,
}

impl<D> FeedSyncClient<D>
where
    D: NotificationDispatch + ?Sized + 'static,
{
    /// Create a client, resuming from the tracking file when it matches
    ///
    /// # Errors
    /// [`FeedError::Config`] when url, cluster id or subject is empty.
    #[instrument(name = "feed_client_new", skip(config, dispatch), fields(url = %config.url))]
    pub async fn new(config: FeedConfig, dispatch: Arc<D>) -> Result<Self, FeedError> {
        validate_identity(&config)?;

        let tracking = TrackingFile::new(&config.tracking_file);
        let resumed = load_cursor(&config, &tracking).await;
        let cursor = resumed.unwrap_or_else(|| initial_cursor(&config));

        info!(
            url = %config.url,
            client_id = %config.effective_client_id(),
            cursor = %cursor,
            resumed = resumed.is_some(),
            "Feed client created"
        );

        Ok(Self {
            throttle: Throttle::from_config(&config.throttle),
            state: SyncState::new(cursor),
            persisted_cursor: resumed,
            config,
            dispatch,
            tracking,
        })
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn mode(&self) -> SyncMode {
        self.state.mode()
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        self.state.cursor()
    }

    /// Write the cursor to the tracking file
    ///
    /// Failures are logged and reported as false; the next flush retries.
    pub async fn persist(&mut self) -> bool {
        let cursor = self.state.cursor();
        let data = TrackingData::for_config(&self.config, cursor);
        match self.tracking.write(&data).await {
            Ok(()) => {
                self.persisted_cursor = Some(cursor);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to write tracking data");
                false
            }
        }
    }

    /// Run until `stop` turns true or the transport finishes
    ///
    /// Closes the transport and persists the cursor before returning.
    #[instrument(
        name = "feed_client_run",
        skip(self, transport, stop),
        fields(url = %self.config.url, subject = %self.config.subject)
    )]
    pub async fn run<T>(
        &mut self,
        transport: &mut T,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), FeedError>
    where
        T: FeedTransport,
    {
        let mut gate: Option<GateFuture> = None;
        let mut deadline: Option<Instant> = None;

        let flush_interval = self.config.tracking_interval().max(Duration::from_millis(1));
        let mut flush = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            if *stop.borrow() {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = stop.changed() => break Ok(()),
                _ = wait_gate(&mut gate) => {
                    gate = None;
                    deadline = Some(self.send_catch_up(transport).await);
                }
                _ = sleep_until_deadline(deadline) => {
                    warn!(cursor = %self.state.cursor(), "No products_created_after response, requesting again");
                    deadline = None;
                    gate = Some(self.gate());
                }
                _ = flush.tick() => {
                    if self.persisted_cursor != Some(self.state.cursor()) {
                        self.persist().await;
                    }
                }
                event = transport.next_event() => match event {
                    Ok(Some(event)) => match self.on_event(event) {
                        CatchUp::Unchanged => {}
                        CatchUp::Schedule => {
                            deadline = None;
                            gate = Some(self.gate());
                        }
                        CatchUp::Answered => deadline = None,
                        CatchUp::Cancel => {
                            deadline = None;
                            gate = None;
                        }
                    },
                    Ok(None) => {
                        info!("Feed transport finished");
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        if let Err(e) = transport.close().await {
            warn!(error = %e, "Failed to close feed transport");
        }
        self.persist().await;
        info!(cursor = %self.state.cursor(), "Feed client stopped");

        result
    }

    fn on_event(&mut self, event: FeedEvent) -> CatchUp {
        match event {
            FeedEvent::Connected => {
                info!(cursor = %self.state.cursor(), "Feed connected, starting catch up");
                match self.state.on_connect() {
                    SyncAction::RequestCatchUp => CatchUp::Schedule,
                    _ => CatchUp::Unchanged,
                }
            }
            FeedEvent::Disconnected { reason } => {
                info!(%reason, "Feed disconnected");
                CatchUp::Cancel
            }
            FeedEvent::Message(raw) => match self.state.on_message(&raw) {
                Some(SyncAction::Dispatch(notification)) => {
                    debug!(product = %notification.product_id, "Dispatching notification");
                    self.dispatch.dispatch(Arc::new(notification));
                    CatchUp::Unchanged
                }
                Some(SyncAction::RequestCatchUp) => CatchUp::Schedule,
                Some(SyncAction::CaughtUp) => CatchUp::Answered,
                None => CatchUp::Unchanged,
            },
        }
    }

    fn gate(&self) -> GateFuture {
        Box::pin(self.throttle.wait_for_capacity(Arc::clone(&self.dispatch)))
    }

    /// Send a catch-up request; returns when to give up waiting for it
    async fn send_catch_up<T: FeedTransport>(&mut self, transport: &mut T) -> Instant {
        let request = CatchUpRequest::new(self.state.cursor());
        match transport.send(request.to_json()).await {
            Ok(()) => {
                observability::record_catch_up_request();
                info!(created_after = %request.created_after, "Sent catch-up request");
                Instant::now() + self.config.catch_up_timeout()
            }
            Err(e) => {
                warn!(error = %e, "Failed to send catch-up request");
                Instant::now() + SEND_RETRY_DELAY
            }
        }
    }
}

async fn wait_gate(gate: &mut Option<GateFuture>) -> Duration {
    match gate {
        Some(gate) => gate.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn validate_identity(config: &FeedConfig) -> Result<(), ContractError> {
    for (field, value) in [
        ("feed.url", &config.url),
        ("feed.cluster_id", &config.cluster_id),
        ("feed.subject", &config.subject),
    ] {
        if value.trim().is_empty() {
            return Err(ContractError::config_validation(field, "must not be empty"));
        }
    }
    Ok(())
}

/// Cursor from the tracking file, if it belongs to this connection
async fn load_cursor(config: &FeedConfig, tracking: &TrackingFile) -> Option<DateTime<Utc>> {
    let identity = TrackingData::for_config(config, Utc::now());
    match tracking.read().await {
        Ok(Some(data)) if data.same_identity(&identity) => Some(data.created_after),
        Ok(Some(data)) => {
            warn!(
                path = %tracking.path().display(),
                tracked_url = %data.url,
                tracked_subject = %data.subject,
                "Tracking data is for a different connection, ignoring"
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read tracking data");
            None
        }
    }
}

/// Now minus the configured initial catch-up age
fn initial_cursor(config: &FeedConfig) -> DateTime<Utc> {
    let now = Utc::now();
    TimeDelta::from_std(config.initial_catch_up_age())
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(now)
}

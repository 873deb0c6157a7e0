//! Catch-up / broadcast state machine
//!
//! Pure protocol logic: every input returns the action the driver should
//! take, so the transitions can be tested without a connection.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use contracts::Notification;

use crate::message::FeedMessage;

/// Sync mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Requesting and consuming history; broadcasts are only tracked
    CatchingUp,
    /// Trusting the broadcast sequence
    Broadcasting,
}

/// What the driver must do after an input
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Hand the notification downstream
    Dispatch(Notification),
    /// Send a catch-up request from the current cursor (through the
    /// backpressure gate)
    RequestCatchUp,
    /// Catch-up finished; now broadcasting
    CaughtUp,
}

/// Protocol state for one feed connection
#[derive(Debug, Clone)]
pub struct SyncState {
    mode: SyncMode,
    last_broadcast_id: Option<i64>,
    cursor: DateTime<Utc>,
}

impl SyncState {
    /// Start catching up from `cursor`
    pub fn new(cursor: DateTime<Utc>) -> Self {
        Self {
            mode: SyncMode::CatchingUp,
            last_broadcast_id: None,
            cursor,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn last_broadcast_id(&self) -> Option<i64> {
        self.last_broadcast_id
    }

    /// Creation time of the newest processed notification
    pub fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    /// Connection (re)established: always catch up first
    pub fn on_connect(&mut self) -> SyncAction {
        self.set_mode(SyncMode::CatchingUp);
        SyncAction::RequestCatchUp
    }

    /// Decode and handle one text frame
    ///
    /// Malformed frames are logged and leave the state unchanged.
    pub fn on_message(&mut self, raw: &str) -> Option<SyncAction> {
        match FeedMessage::parse(raw) {
            Ok(message) => self.handle(message),
            Err(e) => {
                warn!(error = %e, message = %raw, "Ignoring feed message");
                observability::record_feed_message_rejected();
                None
            }
        }
    }

    /// Handle one decoded frame
    pub fn handle(&mut self, message: FeedMessage) -> Option<SyncAction> {
        observability::record_feed_message(message.action());

        match message {
            FeedMessage::Broadcast {
                id,
                created,
                notification,
            } => self.on_broadcast(id, created, notification),
            FeedMessage::Product {
                created,
                notification,
            } => {
                debug!(product = %notification.product_id, %created, "Catch-up product");
                self.advance_cursor(created);
                Some(SyncAction::Dispatch(notification))
            }
            FeedMessage::CatchUpComplete { count, .. } => {
                if count == 0 {
                    info!(cursor = %self.cursor, "Caught up, switching to broadcast");
                    self.set_mode(SyncMode::Broadcasting);
                    Some(SyncAction::CaughtUp)
                } else {
                    debug!(count, cursor = %self.cursor, "Catch-up batch complete, continuing");
                    Some(SyncAction::RequestCatchUp)
                }
            }
        }
    }

    fn on_broadcast(
        &mut self,
        id: i64,
        created: DateTime<Utc>,
        notification: Notification,
    ) -> Option<SyncAction> {
        match self.mode {
            SyncMode::CatchingUp => {
                // live messages wait for the backlog
                debug!(id, "Broadcast while catching up");
                self.last_broadcast_id = Some(id);
                None
            }
            SyncMode::Broadcasting => {
                let last = self.last_broadcast_id.replace(id);
                // no successor after i64::MAX, so anything following it is a gap
                let in_sequence = last.is_none_or(|last| last.checked_add(1) == Some(id));

                if in_sequence {
                    self.advance_cursor(created);
                    Some(SyncAction::Dispatch(notification))
                } else {
                    let expected = last.map_or(id, |last| last.saturating_add(1));
                    observability::record_broadcast_gap(expected, id);
                    info!(
                        expected,
                        received = id,
                        cursor = %self.cursor,
                        "Broadcast ids out of sequence, switching to catch up"
                    );
                    self.set_mode(SyncMode::CatchingUp);
                    Some(SyncAction::RequestCatchUp)
                }
            }
        }
    }

    fn advance_cursor(&mut self, created: DateTime<Utc>) {
        if created > self.cursor {
            self.cursor = created;
            observability::record_cursor(created.timestamp());
        }
    }

    fn set_mode(&mut self, mode: SyncMode) {
        self.mode = mode;
        observability::record_sync_mode(mode == SyncMode::Broadcasting);
    }
}

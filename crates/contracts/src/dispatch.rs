//! NotificationDispatch trait - feed client output interface

use std::sync::Arc;

use crate::Notification;

/// Downstream sink for notifications received from a feed
///
/// Implementations must not block: they hand the notification off and
/// return.
pub trait NotificationDispatch: Send + Sync {
    /// Hand a notification to every interested consumer
    fn dispatch(&self, notification: Arc<Notification>);

    /// Deepest pending-work queue downstream, `None` when there is nothing
    /// to measure
    fn max_queue_depth(&self) -> Option<usize>;
}

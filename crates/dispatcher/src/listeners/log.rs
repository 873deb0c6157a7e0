//! LogListener - logs notification summaries via tracing

use contracts::{ContractError, Notification};
use tracing::{info, instrument};

use super::ListenerSettings;

/// Listener that logs every notification it receives
pub struct LogListener {
    settings: ListenerSettings,
}

impl LogListener {
    pub fn new(settings: ListenerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    /// Log one notification; never fails
    #[instrument(
        name = "log_listener_notify",
        skip(self, notification),
        fields(listener = %self.settings.name)
    )]
    pub async fn on_notification(&self, notification: &Notification) -> Result<(), ContractError> {
        let id = &notification.product_id;
        info!(
            listener = %self.settings.name,
            product = %id,
            source = %id.source,
            product_type = %id.product_type,
            code = %id.code,
            issued = %notification.issued,
            "Notification received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{ContentRef, ProductId};

    #[tokio::test]
    async fn test_log_listener_always_succeeds() {
        let listener = LogListener::new(ListenerSettings::named("test_log"));
        let now = Utc::now();
        let notification = Notification::new(
            ProductId::new("us", "origin", "abc", now),
            now,
            ContentRef::Url("https://example.org/abc".into()),
        );

        assert!(listener.on_notification(&notification).await.is_ok());
        assert_eq!(listener.settings().name, "test_log");
    }
}

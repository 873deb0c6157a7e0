//! NotificationIndex trait - durable record of received notifications

use crate::{ContractError, Notification};

/// Filter for [`NotificationIndex::find_notifications`]
///
/// `None` matches everything for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexQuery {
    pub sources: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    pub codes: Option<Vec<String>>,
}

impl IndexQuery {
    /// Query matching every notification
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether a notification matches this query
    pub fn matches(&self, notification: &Notification) -> bool {
        let id = &notification.product_id;
        field_matches(&self.sources, &id.source)
            && field_matches(&self.types, &id.product_type)
            && field_matches(&self.codes, &id.code)
    }
}

fn field_matches(filter: &Option<Vec<String>>, value: &str) -> bool {
    filter
        .as_ref()
        .is_none_or(|allowed| allowed.iter().any(|a| a == value))
}

/// Index of notifications retained upstream
#[trait_variant::make(NotificationIndex: Send)]
pub trait LocalNotificationIndex {
    /// Index name (part of the reconciliation key)
    fn name(&self) -> &str;

    /// Notifications matching `query`, ascending by index time
    async fn find_notifications(
        &self,
        query: &IndexQuery,
    ) -> Result<Vec<Notification>, ContractError>;
}

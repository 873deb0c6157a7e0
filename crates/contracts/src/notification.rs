//! Notification - announcement that a product is available
//!
//! Created by the feed parser, never mutated afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// How long a feed notification stays valid after it was issued.
pub const DEFAULT_EXPIRATION_DAYS: i64 = 30;

/// Where the product content can be found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentRef {
    /// Content is retrievable from a URL
    Url(String),
    /// Content travelled with the notification
    Inline(serde_json::Value),
}

/// Product notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Product being announced
    pub product_id: ProductId,

    /// When the notification was issued (feed "created" time)
    pub issued: DateTime<Utc>,

    /// When the notification stops being relevant
    pub expiration: DateTime<Utc>,

    /// Tracker to report processing status to (optional)
    #[serde(default)]
    pub tracker_url: Option<String>,

    /// Product content reference
    pub content: ContentRef,
}

impl Notification {
    /// Create a notification expiring [`DEFAULT_EXPIRATION_DAYS`] after `issued`
    pub fn new(product_id: ProductId, issued: DateTime<Utc>, content: ContentRef) -> Self {
        Self {
            product_id,
            issued,
            expiration: issued + Duration::days(DEFAULT_EXPIRATION_DAYS),
            tracker_url: None,
            content,
        }
    }

    /// Attach a tracker url
    pub fn with_tracker(mut self, tracker_url: impl Into<String>) -> Self {
        self.tracker_url = Some(tracker_url.into());
        self
    }

    /// Whether the notification has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiration_defaults_to_thirty_days() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let id = ProductId::new("us", "origin", "abc", issued);
        let n = Notification::new(id, issued, ContentRef::Url("http://x/y".into()));

        assert_eq!(n.expiration - n.issued, Duration::days(30));
        assert!(!n.is_expired(issued + Duration::days(29)));
        assert!(n.is_expired(issued + Duration::days(30)));
    }

    #[test]
    fn test_content_ref_serde_shape() {
        let content = ContentRef::Inline(serde_json::json!({"a": 1}));
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["kind"], "inline");
        assert_eq!(value["value"]["a"], 1);
    }
}

//! Feed wire protocol
//!
//! Every frame is a JSON object with an `action` field:
//!
//! - `broadcast`: live notification, carries a sequence id
//! - `product`: historical notification sent during catch-up
//! - `products_created_after`: end of one catch-up batch, with a `count`
//!
//! The client sends only `products_created_after` requests.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use contracts::{ContentRef, Notification, ProductId};

use crate::error::FeedError;

/// A notification as embedded in feed frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedNotification {
    /// Broadcast sequence id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// When the feed created the notification (cursor position)
    pub created: DateTime<Utc>,
    /// Product document; its `id` object names the product
    pub product: serde_json::Value,
}

impl FeedNotification {
    /// Read the product id from `product.id`
    pub fn product_id(&self) -> Result<ProductId, FeedError> {
        let id = self
            .product
            .get("id")
            .ok_or_else(|| FeedError::malformed("product has no id"))?;
        ProductId::deserialize(id).map_err(|e| FeedError::malformed(format!("product id: {e}")))
    }

    /// Build the downstream notification, with the product inline
    pub fn to_notification(&self) -> Result<Notification, FeedError> {
        Ok(Notification::new(
            self.product_id()?,
            self.created,
            ContentRef::Inline(self.product.clone()),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawMessage {
    Broadcast {
        #[serde(default)]
        id: Option<i64>,
        notification: FeedNotification,
    },
    Product {
        notification: FeedNotification,
    },
    ProductsCreatedAfter {
        #[serde(default)]
        created_after: Option<DateTime<Utc>>,
        count: u64,
    },
}

/// A decoded server frame
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Broadcast {
        id: i64,
        created: DateTime<Utc>,
        notification: Notification,
    },
    Product {
        created: DateTime<Utc>,
        notification: Notification,
    },
    /// End of a catch-up batch
    CatchUpComplete {
        created_after: Option<DateTime<Utc>>,
        count: u64,
    },
}

impl FeedMessage {
    /// Decode one text frame
    ///
    /// Unknown actions, missing fields and unreadable product ids are all
    /// reported as [`FeedError::Malformed`].
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let message: RawMessage =
            serde_json::from_str(raw).map_err(|e| FeedError::malformed(e.to_string()))?;

        match message {
            RawMessage::Broadcast { id, notification } => {
                let id = id
                    .or(notification.id)
                    .ok_or_else(|| FeedError::malformed("broadcast without id"))?;
                Ok(Self::Broadcast {
                    id,
                    created: notification.created,
                    notification: notification.to_notification()?,
                })
            }
            RawMessage::Product { notification } => Ok(Self::Product {
                created: notification.created,
                notification: notification.to_notification()?,
            }),
            RawMessage::ProductsCreatedAfter {
                created_after,
                count,
            } => Ok(Self::CatchUpComplete {
                created_after,
                count,
            }),
        }
    }

    /// Action name, for logs and metrics
    pub fn action(&self) -> &'static str {
        match self {
            Self::Broadcast { .. } => "broadcast",
            Self::Product { .. } => "product",
            Self::CatchUpComplete { .. } => "products_created_after",
        }
    }
}

/// Client request for notifications created after a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpRequest {
    pub created_after: DateTime<Utc>,
}

impl CatchUpRequest {
    pub fn new(created_after: DateTime<Utc>) -> Self {
        Self { created_after }
    }

    /// Encode as a text frame
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "action": "products_created_after",
            "created_after": self
                .created_after
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        })
        .to_string()
    }
}

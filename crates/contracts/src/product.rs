//! ProductId - identity of one version of a product
//!
//! `source`, `type` and `code` name the product; `updateTime` orders its
//! versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// URN scheme used by [`ProductId`]'s `Display` implementation.
pub const PRODUCT_URN_PREFIX: &str = "urn:usgs-product";

/// Product identifier
///
/// Identity is all four fields. A newer `update_time` is a newer version of
/// the same source/type/code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId {
    /// Network that produced the product (e.g. "us")
    pub source: String,

    /// Product type (e.g. "origin", "shakemap")
    #[serde(rename = "type")]
    pub product_type: String,

    /// Source-specific code (usually the event id)
    pub code: String,

    /// Version timestamp
    #[serde(rename = "updateTime")]
    pub update_time: DateTime<Utc>,
}

impl ProductId {
    /// Create a new product id
    pub fn new(
        source: impl Into<String>,
        product_type: impl Into<String>,
        code: impl Into<String>,
        update_time: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            product_type: product_type.into(),
            code: code.into(),
            update_time,
        }
    }

    /// Whether `other` names the same product, ignoring version
    pub fn is_same_product(&self, other: &ProductId) -> bool {
        self.source == other.source
            && self.product_type == other.product_type
            && self.code == other.code
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            PRODUCT_URN_PREFIX,
            self.source,
            self.product_type,
            self.code,
            self.update_time.timestamp_millis()
        )
    }
}

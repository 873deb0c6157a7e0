//! MemoryNotificationIndex - in-process notification index
//!
//! Keeps notifications in insertion order. Used to drive startup
//! reconciliation from a JSON-lines seed file, and in tests.

use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use contracts::{ContractError, IndexQuery, Notification, NotificationIndex};

#[derive(Debug)]
pub struct MemoryNotificationIndex {
    name: String,
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryNotificationIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notifications: RwLock::new(Vec::new()),
        }
    }

    /// Append a notification (index order = insertion order)
    pub fn add(&self, notification: Notification) {
        self.notifications.write().push(notification);
    }

    pub fn len(&self) -> usize {
        self.notifications.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build an index from a file with one JSON notification per line
    ///
    /// Blank lines are skipped.
    #[instrument(name = "memory_index_load", skip(name, path), fields(path = %path.as_ref().display()))]
    pub async fn load_json_lines(
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, ContractError> {
        let index = Self::new(name);
        let text = tokio::fs::read_to_string(path.as_ref()).await?;

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let notification: Notification = serde_json::from_str(line).map_err(|e| {
                ContractError::index(&index.name, format!("line {}: {}", number + 1, e))
            })?;
            index.add(notification);
        }

        debug!(index = %index.name, notifications = index.len(), "Index loaded");
        Ok(index)
    }
}

impl NotificationIndex for MemoryNotificationIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_notifications(
        &self,
        query: &IndexQuery,
    ) -> Result<Vec<Notification>, ContractError> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| query.matches(n))
            .cloned()
            .collect())
    }
}

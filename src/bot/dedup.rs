use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// How long a message id is remembered
pub const MESSAGE_RETENTION_SECONDS: i64 = 10;

/// Remembers recently seen chat message ids so each one is handled once
pub struct MessageDeduplicator {
    seen: RwLock<HashMap<String, DateTime<Utc>>>,
    retention: Duration,
}

impl MessageDeduplicator {
    pub fn new() -> Self {
        Self::with_retention(Duration::seconds(MESSAGE_RETENTION_SECONDS))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Returns true if the message should be processed.
    ///
    /// Messages without an id are never processed. An entry older than the
    /// retention window counts as absent even before the sweep removes it.
    pub async fn observe(&self, id: Option<&str>, now: DateTime<Utc>) -> bool {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            debug!("Dropping message without id");
            return false;
        };

        let mut seen = self.seen.write().await;
        if let Some(seen_at) = seen.get(id) {
            if now.signed_duration_since(*seen_at) <= self.retention {
                debug!("Duplicate message {} suppressed", id);
                return false;
            }
        }

        seen.insert(id.to_string(), now);
        true
    }

    /// Drop entries older than the retention window, returning how many were removed
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut seen = self.seen.write().await;
        let before = seen.len();
        seen.retain(|_, seen_at| now.signed_duration_since(*seen_at) <= self.retention);

        let removed = before - seen.len();
        if removed > 0 {
            debug!("Swept {} expired message ids", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.len()
    }
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

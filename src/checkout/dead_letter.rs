use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::error;

const DEFAULT_CAPACITY: usize = 256;

/// A confirmed payment whose entitlement update could not be applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpgrade {
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub package_name: Option<String>,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Error channel for webhook work that runs after the provider was already
/// acknowledged. Entries are logged at error level and the newest ones kept
/// for operators.
pub struct DeadLetterLog {
    entries: RwLock<VecDeque<FailedUpgrade>>,
    capacity: usize,
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DeadLetterLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, entry: FailedUpgrade) {
        error!(
            target: "dead_letter",
            event_id = ?entry.event_id,
            user_id = ?entry.user_id,
            package_name = ?entry.package_name,
            "Entitlement upgrade failed: {}",
            entry.reason
        );
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub async fn entries(&self) -> Vec<FailedUpgrade> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

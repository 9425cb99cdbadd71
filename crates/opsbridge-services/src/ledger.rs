//! Per-service initialization status
//!
//! Written by every initialization task, read by status reports. Readers get
//! copies, never references into the map.

use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Outcome of one service's initialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status and error for every service that was attempted
#[derive(Debug, Default)]
pub struct StatusLedger {
    entries: RwLock<BTreeMap<String, ServiceStatus>>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a service as being attempted
    pub async fn record_attempt(&self, name: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(
            name.to_string(),
            ServiceStatus {
                attempted: true,
                succeeded: false,
                error: None,
            },
        );
    }

    pub async fn record_success(&self, name: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(
            name.to_string(),
            ServiceStatus {
                attempted: true,
                succeeded: true,
                error: None,
            },
        );
    }

    pub async fn record_failure(&self, name: &str, error: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            name.to_string(),
            ServiceStatus {
                attempted: true,
                succeeded: false,
                error: Some(error.into()),
            },
        );
    }

    pub async fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.entries.read().await.get(name).cloned()
    }

    /// Whether the named service initialized successfully
    pub async fn succeeded(&self, name: &str) -> bool {
        self.entries
            .read()
            .await
            .get(name)
            .map(|s| s.succeeded)
            .unwrap_or(false)
    }

    pub async fn error(&self, name: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(name)
            .and_then(|s| s.error.clone())
    }

    /// Copy of every entry, ordered by name
    pub async fn snapshot(&self) -> BTreeMap<String, ServiceStatus> {
        self.entries.read().await.clone()
    }

    /// (succeeded, failed) over attempted services
    pub async fn counts(&self) -> (usize, usize) {
        let entries = self.entries.read().await;
        let ok = entries.values().filter(|s| s.succeeded).count();
        (ok, entries.len() - ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_and_read() {
        let ledger = StatusLedger::new();
        assert!(ledger.status("prometheus").await.is_none());
        assert!(!ledger.succeeded("prometheus").await);

        ledger.record_attempt("prometheus").await;
        let status = ledger.status("prometheus").await.unwrap();
        assert!(status.attempted && !status.succeeded);

        ledger.record_success("prometheus").await;
        ledger.record_failure("grafana", "401 Unauthorized").await;

        assert!(ledger.succeeded("prometheus").await);
        assert_eq!(ledger.error("prometheus").await, None);
        assert_eq!(ledger.error("grafana").await.as_deref(), Some("401 Unauthorized"));
        assert_eq!(ledger.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let ledger = StatusLedger::new();
        ledger.record_success("a").await;

        let mut snapshot = ledger.snapshot().await;
        snapshot.clear();

        assert!(ledger.succeeded("a").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers() {
        let ledger = Arc::new(StatusLedger::new());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    let name = format!("svc-{}", i);
                    ledger.record_attempt(&name).await;
                    if i % 2 == 0 {
                        ledger.record_success(&name).await;
                    } else {
                        ledger.record_failure(&name, "down").await;
                    }
                    ledger.snapshot().await.len()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ledger.counts().await, (32, 32));
    }
}

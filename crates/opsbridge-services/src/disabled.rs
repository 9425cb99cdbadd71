//! Run-time tool suppression
//!
//! Independent of service health: a tool can be switched off while its
//! service is up, and switched back on later. Takes effect on the next
//! registration pass.

use std::collections::BTreeSet;
use tokio::sync::RwLock;
use tracing::info;

/// Set of tool names excluded from the dispatch table
#[derive(Debug, Default)]
pub struct DisabledTools {
    names: RwLock<BTreeSet<String>>,
}

impl DisabledTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set
    pub async fn replace<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let next: BTreeSet<String> = names.into_iter().collect();
        *self.names.write().await = next;
    }

    /// Returns false if the tool was already disabled
    pub async fn disable(&self, name: &str) -> bool {
        let added = self.names.write().await.insert(name.to_string());
        if added {
            info!("Disabled tool: {}", name);
        }
        added
    }

    /// Returns false if the tool was not disabled
    pub async fn enable(&self, name: &str) -> bool {
        let removed = self.names.write().await.remove(name);
        if removed {
            info!("Re-enabled tool: {}", name);
        }
        removed
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.names.read().await.contains(name)
    }

    /// Sorted copy of the disabled names
    pub async fn list(&self) -> Vec<String> {
        self.names.read().await.iter().cloned().collect()
    }

    /// Copy of the set, taken under one read lock
    pub async fn snapshot(&self) -> BTreeSet<String> {
        self.names.read().await.clone()
    }
}

//! The set of services a manager knows how to build
//!
//! Exactly one entry is critical. The catalog holds factories rather than
//! instances so that services excluded by the filter are never constructed.

use std::sync::Arc;

use crate::service::{BoxedService, Service, ServiceFactory};

pub(crate) struct CatalogEntry {
    pub name: String,
    pub critical: bool,
    pub factory: ServiceFactory,
}

/// Known services in initialization and shutdown order
pub struct ServiceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    /// Start a catalog with its critical service
    pub fn new<F, S>(critical: &str, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Service + 'static,
    {
        Self {
            entries: vec![CatalogEntry {
                name: critical.to_string(),
                critical: true,
                factory: Box::new(move || -> BoxedService { Arc::new(factory()) }),
            }],
        }
    }

    /// Add an optional service
    pub fn optional<F, S>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Service + 'static,
    {
        self.entries.push(CatalogEntry {
            name: name.to_string(),
            critical: false,
            factory: Box::new(move || -> BoxedService { Arc::new(factory()) }),
        });
        self
    }

    /// Known service names, critical first
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn critical(&self) -> &str {
        // The constructor always pushes the critical entry first
        self.entries
            .iter()
            .find(|e| e.critical)
            .map(|e| e.name.as_str())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }
}

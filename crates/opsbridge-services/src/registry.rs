//! Service Registry
//!
//! Populated once, single-threaded, while the manager constructs services;
//! read-only after that. Mutation needs `&mut self`, so concurrent
//! registration cannot happen without the owner adding its own locking.

use opsbridge_tools::{BoxedHandler, ToolDefinition};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::service::BoxedService;

/// Collection of constructed services
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<BoxedService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service. Each name is expected to be registered once.
    pub fn register(&mut self, service: BoxedService) {
        if self.get(service.name()).is_some() {
            warn!("Service '{}' registered more than once", service.name());
        }
        debug!("Registered service: {}", service.name());
        self.services.push(service);
    }

    /// Look up a registered service by name
    pub fn get(&self, name: &str) -> Option<&BoxedService> {
        self.services.iter().find(|s| s.name() == name)
    }

    /// All registered services in registration order
    pub fn all(&self) -> &[BoxedService] {
        &self.services
    }

    /// Services whose `is_enabled` is true right now
    pub fn enabled_services(&self) -> BTreeMap<String, BoxedService> {
        self.services
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| (s.name().to_string(), s.clone()))
            .collect()
    }

    /// Every advertised tool, enabled or not
    pub fn all_capabilities(&self) -> Vec<ToolDefinition> {
        self.services
            .iter()
            .flat_map(|s| s.capabilities())
            .collect()
    }

    /// Every handler, enabled or not. On a name clash the first service wins.
    pub fn all_executors(&self) -> HashMap<String, BoxedHandler> {
        let mut executors = HashMap::new();
        for service in &self.services {
            for (name, handler) in service.executors() {
                executors.entry(name).or_insert(handler);
            }
        }
        executors
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubService;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_enabled_services_filters_by_state() {
        let mut registry = ServiceRegistry::new();
        let up = Arc::new(StubService::new("up").with_tools(&["up_list"]));
        let down = Arc::new(StubService::new("down").failing("unreachable"));
        registry.register(up.clone());
        registry.register(down.clone());

        assert!(registry.enabled_services().is_empty());

        let config = Default::default();
        crate::Service::initialize(up.as_ref(), &config).await.unwrap();
        assert!(crate::Service::initialize(down.as_ref(), &config).await.is_err());

        let enabled = registry.enabled_services();
        assert_eq!(enabled.keys().collect::<Vec<_>>(), vec!["up"]);
    }

    #[tokio::test]
    async fn test_flatten_capabilities_and_executors() {
        let mut registry = ServiceRegistry::new();
        let a = Arc::new(StubService::new("a").with_tools(&["a_one", "a_two"]));
        let b = Arc::new(StubService::new("b").with_tools(&["b_one"]).without_executor("b_one"));
        registry.register(a.clone());
        registry.register(b.clone());

        let config = Default::default();
        crate::Service::initialize(a.as_ref(), &config).await.unwrap();
        crate::Service::initialize(b.as_ref(), &config).await.unwrap();

        let mut names: Vec<String> = registry
            .all_capabilities()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a_one", "a_two", "b_one"]);

        let executors = registry.all_executors();
        assert_eq!(executors.len(), 2);
        assert!(!executors.contains_key("b_one"));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("b").is_some());
    }
}

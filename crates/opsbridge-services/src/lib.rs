//! opsbridge-services: Service registry and lifecycle management
//!
//! Discovers, initializes and exposes a set of backend integrations behind
//! one tool namespace.
//!
//! ## Lifecycle
//!
//! ```text
//! ServiceManager::initialize(config)
//!   ├─ snapshot disabled tools
//!   ├─ apply service filter (excluded services are never built)
//!   ├─ construct + register remaining services
//!   ├─ initialize critical service   (failure aborts startup)
//!   └─ initialize optional services  (one task each, joined; failures recorded)
//!
//! ServiceManager::register_capabilities(&table)   merge tools, report defects
//! ServiceManager::shutdown()                      close all, aggregate errors
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opsbridge_services::ServiceManager;
//! use opsbridge_tools::ToolRegistry;
//!
//! let config = AppConfig::load_default()?;
//! let mut manager = ServiceManager::new();
//! manager.initialize(&config).await?;
//!
//! let table = ToolRegistry::new();
//! manager.register_capabilities(&table).await;
//! let pods = table.call("kubernetes_list_pods", json!({"namespace": "default"})).await?;
//!
//! manager.shutdown().await?;
//! ```

pub mod backends;
pub mod catalog;
pub mod disabled;
pub mod filter;
pub mod ledger;
pub mod manager;
pub mod registry;
pub mod service;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-exports
pub use backends::{builtin_catalog, BUILTIN_SERVICES, CRITICAL_SERVICE};
pub use catalog::ServiceCatalog;
pub use disabled::DisabledTools;
pub use ledger::{ServiceStatus, StatusLedger};
pub use manager::{
    ManagerState, RegistrationDefect, RegistrationSummary, ServiceManager, ServiceReport,
};
pub use registry::ServiceRegistry;
pub use service::{BoxedService, Closeable, Service};

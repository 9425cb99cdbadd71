//! Service Manager - builds, initializes, registers and shuts down services
//!
//! ```text
//! Unstarted ──initialize──▶ Initializing ──▶ Ready
//!                                  │
//!                                  └──critical failure──▶ Failed
//! ```
//!
//! The critical service is initialized on the caller's task before anything
//! else. Optional services are then initialized concurrently, one task each,
//! and joined before `initialize` returns. An optional failure (or panic) is
//! recorded and logged but never returned.

use futures::future::join_all;
use opsbridge_core::{AppConfig, Error, Result};
use opsbridge_tools::{BoxedHandler, ToolDefinition, ToolRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::catalog::ServiceCatalog;
use crate::disabled::DisabledTools;
use crate::filter::resolve_excluded;
use crate::ledger::{ServiceStatus, StatusLedger};
use crate::registry::ServiceRegistry;
use crate::service::{BoxedService, ServiceFactory};

/// Lifecycle state of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Unstarted,
    Initializing,
    Ready,
    Failed,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Unstarted => "unstarted",
            ManagerState::Initializing => "initializing",
            ManagerState::Ready => "ready",
            ManagerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A problem found while merging service tools into one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationDefect {
    /// Advertised with no executor
    Orphaned { tool: String, service: String },
    /// Executor present, never advertised
    Unadvertised { tool: String, service: String },
    /// Name already claimed by another service
    Duplicate {
        tool: String,
        service: String,
        owner: String,
    },
}

impl fmt::Display for RegistrationDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationDefect::Orphaned { tool, service } => write!(
                f,
                "tool '{}' advertised by service '{}' has no executor",
                tool, service
            ),
            RegistrationDefect::Unadvertised { tool, service } => write!(
                f,
                "executor '{}' in service '{}' has no advertised tool",
                tool, service
            ),
            RegistrationDefect::Duplicate {
                tool,
                service,
                owner,
            } => write!(
                f,
                "tool '{}' from service '{}' is already provided by service '{}'",
                tool, service, owner
            ),
        }
    }
}

/// Totals from one registration pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationSummary {
    pub seen: usize,
    pub registered: usize,
    pub skipped_disabled: usize,
    pub orphaned: usize,
    pub duplicates: usize,
    pub unadvertised: usize,
}

/// What a registration pass would install, and what it refused
struct RegistrationPlan {
    entries: Vec<(ToolDefinition, BoxedHandler)>,
    defects: Vec<RegistrationDefect>,
    summary: RegistrationSummary,
}

/// One row of the operator-facing status report
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub name: String,
    pub critical: bool,
    /// Removed by the service filter before construction
    pub excluded: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
}

struct ServiceSlot {
    name: String,
    critical: bool,
    excluded: bool,
    factory: Option<ServiceFactory>,
    service: Option<BoxedService>,
}

/// Owns every service for the lifetime of the process
pub struct ServiceManager {
    slots: Vec<ServiceSlot>,
    registry: ServiceRegistry,
    ledger: Arc<StatusLedger>,
    disabled_tools: Arc<DisabledTools>,
    state: ManagerState,
    shut_down: bool,
}

impl ServiceManager {
    /// Manager over the builtin backends
    pub fn new() -> Self {
        Self::with_catalog(crate::backends::builtin_catalog())
    }

    /// Manager over an arbitrary catalog
    pub fn with_catalog(catalog: ServiceCatalog) -> Self {
        let slots = catalog
            .into_entries()
            .into_iter()
            .map(|entry| ServiceSlot {
                name: entry.name,
                critical: entry.critical,
                excluded: false,
                factory: Some(entry.factory),
                service: None,
            })
            .collect();

        Self {
            slots,
            registry: ServiceRegistry::new(),
            ledger: Arc::new(StatusLedger::new()),
            disabled_tools: Arc::new(DisabledTools::new()),
            state: ManagerState::Unstarted,
            shut_down: false,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Services still present after filtering, in catalog order
    pub fn active_service_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| !s.excluded)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Drop every service the operator excluded.
    ///
    /// Safe to call repeatedly before `initialize`; unknown names are
    /// ignored. Once initialization has started the service set is fixed and
    /// this only logs a warning.
    pub fn filter_services(&mut self, disabled: &[String], enabled: &[String]) {
        if self.state != ManagerState::Unstarted {
            warn!(
                "Ignoring service filter, manager is already {}",
                self.state
            );
            return;
        }
        self.apply_filter(disabled, enabled);
    }

    fn apply_filter(&mut self, disabled: &[String], enabled: &[String]) {
        let known: Vec<&str> = self.slots.iter().map(|s| s.name.as_str()).collect();
        let excluded = resolve_excluded(&known, disabled, enabled);

        for slot in self.slots.iter_mut() {
            if excluded.contains(&slot.name) && !slot.excluded {
                info!("Service '{}' excluded by configuration", slot.name);
                slot.excluded = true;
                slot.factory = None;
            }
        }
    }

    /// Build and initialize every service.
    ///
    /// Returns an error only when the critical service is excluded or fails
    /// to initialize; the manager is then `Failed` and must not serve.
    pub async fn initialize(&mut self, config: &AppConfig) -> Result<()> {
        if self.state != ManagerState::Unstarted {
            return Err(Error::AlreadyInitialized(self.state.to_string()));
        }
        self.state = ManagerState::Initializing;
        info!("Initializing {} known services", self.slots.len());

        self.disabled_tools
            .replace(config.disabled_tools.iter().cloned())
            .await;
        self.apply_filter(&config.disabled_services, &config.enabled_services);

        for slot in self.slots.iter_mut() {
            let Some(factory) = slot.factory.take() else {
                continue;
            };
            let service = factory();
            if service.name() != slot.name {
                // the ledger, the filter and the registry all key on one name
                let message = format!(
                    "service reports name '{}' but is catalogued as '{}'",
                    service.name(),
                    slot.name
                );
                error!("{}", message);
                self.ledger.record_attempt(&slot.name).await;
                self.ledger.record_failure(&slot.name, message).await;
                continue;
            }
            self.registry.register(service.clone());
            slot.service = Some(service);
        }

        self.initialize_critical(config).await?;
        self.initialize_optional(config).await;

        self.state = ManagerState::Ready;
        self.log_status_table().await;
        Ok(())
    }

    async fn initialize_critical(&mut self, config: &AppConfig) -> Result<()> {
        let critical = self
            .slots
            .iter()
            .find(|s| s.critical)
            .map(|s| (s.name.clone(), s.excluded, s.service.clone()));

        let Some((name, excluded, service)) = critical else {
            self.state = ManagerState::Failed;
            return Err(Error::critical_service("<none>", "catalog has no critical service"));
        };

        if excluded {
            self.state = ManagerState::Failed;
            error!("Critical service '{}' was excluded by configuration", name);
            self.ledger
                .record_failure(&name, "excluded by configuration")
                .await;
            return Err(Error::critical_service(&name, "excluded by configuration"));
        }

        let Some(service) = service else {
            self.state = ManagerState::Failed;
            let message = self
                .ledger
                .error(&name)
                .await
                .unwrap_or_else(|| "service was not constructed".to_string());
            error!("Critical service '{}' unusable: {}", name, message);
            return Err(Error::critical_service(&name, message));
        };

        info!("Initializing critical service '{}'", name);
        self.ledger.record_attempt(&name).await;

        match service.initialize(config).await {
            Ok(()) => {
                self.ledger.record_success(&name).await;
                info!("Critical service '{}' ready", name);
                Ok(())
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("Critical service '{}' failed: {}", name, message);
                self.ledger.record_failure(&name, message.clone()).await;
                self.state = ManagerState::Failed;
                Err(Error::critical_service(&name, message))
            }
        }
    }

    async fn initialize_optional(&self, config: &AppConfig) {
        let config = Arc::new(config.clone());
        let mut handles = Vec::new();

        for slot in self.slots.iter().filter(|s| !s.critical) {
            let Some(service) = slot.service.clone() else {
                continue;
            };
            let name = slot.name.clone();
            let config = config.clone();
            let ledger = self.ledger.clone();

            ledger.record_attempt(&name).await;
            debug!("Spawning initialization for '{}'", name);

            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                match service.initialize(&config).await {
                    Ok(()) => ledger.record_success(&task_name).await,
                    Err(e) => {
                        let message = format!("{:#}", e);
                        warn!("Optional service '{}' unavailable: {}", task_name, message);
                        ledger.record_failure(&task_name, message).await;
                    }
                }
            });
            handles.push((name, handle));
        }

        let outcomes = join_all(
            handles
                .into_iter()
                .map(|(name, handle)| async move { (name, handle.await) }),
        )
        .await;

        for (name, outcome) in outcomes {
            if let Err(join_error) = outcome {
                let message = describe_join_error(join_error);
                error!("Optional service '{}' initialization aborted: {}", name, message);
                self.ledger.record_failure(&name, message).await;
            }
        }
    }

    async fn log_status_table(&self) {
        let statuses = self.ledger.snapshot().await;
        info!("Service status:");
        for slot in &self.slots {
            match statuses.get(&slot.name) {
                Some(status) if status.succeeded => info!("  ✓ {}", slot.name),
                Some(status) => warn!(
                    "  ✗ {}: {}",
                    slot.name,
                    status.error.as_deref().unwrap_or("unknown error")
                ),
                None => info!("  - {} (excluded)", slot.name),
            }
        }

        let (ok, failed) = self.ledger.counts().await;
        info!("{} services initialized, {} failed", ok, failed);
    }

    /// Install every registrable tool from enabled services into `table`.
    ///
    /// The table is replaced wholesale, so running this again after a
    /// disable/enable change reflects the new set.
    pub async fn register_capabilities(&self, table: &ToolRegistry) -> RegistrationSummary {
        let plan = self.plan_registration().await;

        for defect in &plan.defects {
            error!("Registration defect: {}", defect);
        }

        table.replace_all(plan.entries).await;

        let summary = plan.summary;
        info!(
            seen = summary.seen,
            registered = summary.registered,
            skipped_disabled = summary.skipped_disabled,
            orphaned = summary.orphaned,
            duplicates = summary.duplicates,
            unadvertised = summary.unadvertised,
            "Registered tools"
        );
        summary
    }

    /// Run the registration logic without installing anything.
    ///
    /// Returns `(true, [])` when every enabled tool would register cleanly.
    pub async fn verify_registration(&self) -> (bool, Vec<String>) {
        let plan = self.plan_registration().await;
        let defects: Vec<String> = plan.defects.iter().map(|d| d.to_string()).collect();
        (defects.is_empty(), defects)
    }

    /// Structured form of [`verify_registration`](Self::verify_registration)
    pub async fn registration_defects(&self) -> Vec<RegistrationDefect> {
        self.plan_registration().await.defects
    }

    async fn plan_registration(&self) -> RegistrationPlan {
        let disabled = self.disabled_tools.snapshot().await;
        let mut plan = RegistrationPlan {
            entries: Vec::new(),
            defects: Vec::new(),
            summary: RegistrationSummary::default(),
        };
        let mut owners: HashMap<String, String> = HashMap::new();

        for (service_name, service) in self.registry.enabled_services() {
            let mut executors = service.executors();

            for definition in service.capabilities() {
                plan.summary.seen += 1;
                let handler = executors.remove(&definition.name);

                if disabled.contains(&definition.name) {
                    debug!("Skipping disabled tool '{}'", definition.name);
                    plan.summary.skipped_disabled += 1;
                    continue;
                }

                let Some(handler) = handler else {
                    plan.summary.orphaned += 1;
                    plan.defects.push(RegistrationDefect::Orphaned {
                        tool: definition.name.clone(),
                        service: service_name.clone(),
                    });
                    continue;
                };

                if let Some(owner) = owners.get(&definition.name) {
                    plan.summary.duplicates += 1;
                    plan.defects.push(RegistrationDefect::Duplicate {
                        tool: definition.name.clone(),
                        service: service_name.clone(),
                        owner: owner.clone(),
                    });
                    continue;
                }

                owners.insert(definition.name.clone(), service_name.clone());
                plan.summary.registered += 1;
                plan.entries.push((definition, handler));
            }

            let mut leftovers: Vec<String> = executors.into_keys().collect();
            leftovers.sort();
            for tool in leftovers {
                plan.summary.unadvertised += 1;
                plan.defects.push(RegistrationDefect::Unadvertised {
                    tool,
                    service: service_name.clone(),
                });
            }
        }

        plan
    }

    /// Close every closeable service once, collecting every failure
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            debug!("Shutdown already performed");
            return Ok(());
        }
        self.shut_down = true;

        let mut attempted = 0;
        let mut failures = Vec::new();

        for slot in &self.slots {
            let Some(service) = &slot.service else {
                continue;
            };
            let Some(closeable) = service.as_closeable() else {
                continue;
            };

            attempted += 1;
            match closeable.close().await {
                Ok(()) => debug!("Closed service '{}'", slot.name),
                Err(e) => {
                    warn!("Failed to close service '{}': {:#}", slot.name, e);
                    failures.push(format!("{}: {:#}", slot.name, e));
                }
            }
        }

        if failures.is_empty() {
            info!("Shut down {} services", attempted);
            Ok(())
        } else {
            Err(Error::Shutdown {
                failed: failures.len(),
                attempted,
                details: failures.join("; "),
            })
        }
    }

    /// Names of currently enabled services, sorted
    pub fn enabled_service_names(&self) -> Vec<String> {
        self.registry.enabled_services().into_keys().collect()
    }

    /// Whether the named service initialized successfully
    pub async fn service_status(&self, name: &str) -> bool {
        self.ledger.succeeded(name).await
    }

    /// Initialization error of the named service, if any
    pub async fn service_error(&self, name: &str) -> Option<String> {
        self.ledger.error(name).await
    }

    pub async fn disable_operation(&self, name: &str) -> bool {
        self.disabled_tools.disable(name).await
    }

    pub async fn enable_operation(&self, name: &str) -> bool {
        self.disabled_tools.enable(name).await
    }

    pub async fn list_disabled_operations(&self) -> Vec<String> {
        self.disabled_tools.list().await
    }

    /// Shared handle on the disabled-tool set, for callers outside the manager
    pub fn disabled_operations(&self) -> Arc<DisabledTools> {
        self.disabled_tools.clone()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// One row per known service, in catalog order
    pub async fn status_report(&self) -> Vec<ServiceReport> {
        let statuses = self.ledger.snapshot().await;
        self.slots
            .iter()
            .map(|slot| ServiceReport {
                name: slot.name.clone(),
                critical: slot.critical,
                excluded: slot.excluded,
                enabled: slot
                    .service
                    .as_ref()
                    .map(|s| s.is_enabled())
                    .unwrap_or(false),
                status: statuses.get(&slot.name).cloned(),
            })
            .collect()
    }
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "initialization task was cancelled".to_string();
    }

    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("panicked during initialization: {}", detail)
}

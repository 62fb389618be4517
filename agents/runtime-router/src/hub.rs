//! Runtime Hub
//!
//! The service object that owns the connection registry for the lifetime of
//! the process: it seeds the registry from persisted state, the allowlist and
//! the well-known engine sockets, runs the refresher, and answers routing
//! questions for sync workers. Bootstrap never fails; at worst the registry
//! starts empty and fills on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cli::config::{Config, DEFAULT_ENDPOINTS};
use crate::error::{PersistenceError, RegistryError};
use crate::registry::{ConnectionPair, Refresher, Registry};
use crate::runtime::adapter::EndpointConnector;
use crate::runtime::endpoint::EndpointAddress;
use crate::store::{FileRegistryStore, RegistryStore};
use crate::workload::{WorkloadBinding, WorkloadSelector, RUNTIME_OVERRIDE_LABEL};

/// Settings the hub bootstraps with
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Initial freshness period, also the dial timeout for seeded endpoints
    pub default_timeout: Duration,
    /// Endpoints merged in after the allowlist
    pub default_endpoints: Vec<String>,
    /// Runtime override label key
    pub label_key: String,
}

impl HubOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_timeout: config.registry.default_timeout(),
            default_endpoints: config.registry.default_endpoints.clone(),
            label_key: config.selector.label_key.clone(),
        }
    }
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            default_timeout: crate::registry::DEFAULT_PERIOD,
            default_endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            label_key: RUNTIME_OVERRIDE_LABEL.to_string(),
        }
    }
}

/// Process-wide owner of the connection registry
pub struct RuntimeHub {
    registry: Arc<Registry>,
    refresher: Refresher,
    selector: WorkloadSelector,
    store: Arc<dyn RegistryStore>,
}

impl RuntimeHub {
    /// Build a registry over `connector` and seed it
    pub async fn bootstrap(
        connector: Arc<dyn EndpointConnector>,
        store: Arc<dyn RegistryStore>,
        options: HubOptions,
    ) -> Self {
        let registry = Arc::new(Registry::new(connector, options.default_timeout));
        Self::bootstrap_with(registry, store, options).await
    }

    /// Bootstrap from configuration, persisting to the configured files
    pub async fn from_config(config: &Config, connector: Arc<dyn EndpointConnector>) -> Self {
        let store = Arc::new(FileRegistryStore::new(
            &config.registry.state_path,
            &config.registry.allowlist_path,
        ));
        Self::bootstrap(connector, store, HubOptions::from_config(config)).await
    }

    /// Seed an existing registry and start its refresher
    pub async fn bootstrap_with(
        registry: Arc<Registry>,
        store: Arc<dyn RegistryStore>,
        options: HubOptions,
    ) -> Self {
        info!("Bootstrapping runtime registry");

        match store.load_state().await {
            Ok(Some(record)) => {
                registry.set_freshness_period(record.period());
                let restored = adopt(&registry, record.addresses.iter(), "state").await;
                info!(restored, "Registry state loaded");
            }
            Ok(None) => info!("No saved registry state"),
            Err(e) => warn!(error = %e, "Ignoring unreadable registry state"),
        }

        match store.load_allowlist().await {
            Ok(Some(allowlist)) => {
                let added = adopt(&registry, allowlist.iter(), "allowlist").await;
                info!(added, "Endpoint allowlist loaded");
            }
            Ok(None) => info!("No endpoint allowlist"),
            Err(e) => warn!(error = %e, "Ignoring unreadable endpoint allowlist"),
        }

        let added = adopt(&registry, options.default_endpoints.iter(), "defaults").await;
        debug!(added, "Default endpoints merged");

        let refresher = Refresher::new(registry.clone());
        refresher.start().await;

        info!(
            endpoints = registry.len(),
            period_ms = registry.period().as_millis() as u64,
            "Runtime registry ready"
        );

        Self {
            registry,
            refresher,
            selector: WorkloadSelector::new(options.label_key),
            store,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    pub fn selector(&self) -> &WorkloadSelector {
        &self.selector
    }

    /// Routing decision for one workload
    pub fn select(&self, labels: &HashMap<String, String>) -> WorkloadBinding {
        self.selector.select(labels, &self.registry)
    }

    /// Clients for a workload: its override endpoint when bound, otherwise
    /// `default_endpoint`
    pub async fn clients_for(
        &self,
        labels: &HashMap<String, String>,
        default_endpoint: &EndpointAddress,
        timeout: Duration,
    ) -> Result<ConnectionPair, RegistryError> {
        let binding = self.select(labels);
        let target = binding.target().unwrap_or(default_endpoint);
        self.registry.resolve_address(target, timeout).await
    }

    /// Persist registry state. Failures leave the in-memory registry as is.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        let record = self.registry.persisted_state();
        self.store.save_state(&record).await.map_err(|e| {
            warn!(error = %e, "Failed to save registry state");
            e
        })
    }

    /// Stop the refresher, persist state and release every connection.
    /// Connections are released even when saving fails.
    pub async fn shutdown(&self) -> Result<(), PersistenceError> {
        info!("Shutting down runtime registry");
        self.refresher.stop().await;
        let saved = self.save().await;
        self.registry.release_all();
        saved
    }
}

/// Resolve every not-yet-known address, logging and skipping failures
async fn adopt<I, S>(registry: &Registry, addresses: I, source: &str) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut added = 0;

    for raw in addresses {
        let address = match EndpointAddress::new(raw.as_ref()) {
            Ok(address) => address,
            Err(e) => {
                warn!(source, error = %e, "Skipping invalid endpoint");
                continue;
            }
        };

        if registry.is_known(&address) {
            continue;
        }

        match registry.resolve_address(&address, registry.period()).await {
            Ok(_) => added += 1,
            Err(e) => warn!(source, address = %address, error = %e, "Endpoint unavailable"),
        }
    }

    added
}

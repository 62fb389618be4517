//! Workload Runtime Selector
//!
//! Decides per workload whether it should run on a registered, non-default
//! endpoint. The decision is driven by a single label whose value encodes a
//! socket path with `_` standing in for `/`, e.g. `var_run_crio_crio.sock`
//! for `unix:///var/run/crio/crio.sock`.

use std::collections::HashMap;
use tracing::debug;

use crate::registry::Registry;
use crate::runtime::endpoint::EndpointAddress;

/// Label that requests a specific runtime endpoint
pub const RUNTIME_OVERRIDE_LABEL: &str = "userruntime";

const ENDPOINT_PREFIX: &str = "unix:///";

/// Turn an override label value into an endpoint address string.
///
/// The mapping is one-way: a literal `_` in a path component cannot be
/// expressed.
pub fn encode_label_value(value: &str) -> String {
    format!("{}{}", ENDPOINT_PREFIX, value.replace('_', "/"))
}

/// Where a workload should be serviced for one sync cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkloadBinding {
    /// Use the host's default endpoint
    #[default]
    Default,
    /// Use this registered endpoint instead
    Override(EndpointAddress),
}

impl WorkloadBinding {
    pub fn is_active(&self) -> bool {
        matches!(self, WorkloadBinding::Override(_))
    }

    pub fn target(&self) -> Option<&EndpointAddress> {
        match self {
            WorkloadBinding::Default => None,
            WorkloadBinding::Override(address) => Some(address),
        }
    }
}

/// Stateless label-driven endpoint selector
#[derive(Debug, Clone)]
pub struct WorkloadSelector {
    label_key: String,
}

impl WorkloadSelector {
    pub fn new(label_key: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
        }
    }

    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    /// Endpoint the labels ask for, registered or not
    pub fn requested_endpoint(&self, labels: &HashMap<String, String>) -> Option<EndpointAddress> {
        let value = labels.get(&self.label_key)?;
        EndpointAddress::new(encode_label_value(value)).ok()
    }

    /// Bind the workload to its requested endpoint if the registry already
    /// knows it. Unknown endpoints are never registered from a label.
    pub fn select(&self, labels: &HashMap<String, String>, registry: &Registry) -> WorkloadBinding {
        let Some(candidate) = self.requested_endpoint(labels) else {
            return WorkloadBinding::Default;
        };

        if registry.is_known(&candidate) {
            debug!(endpoint = %candidate, "Workload bound to override endpoint");
            WorkloadBinding::Override(candidate)
        } else {
            debug!(endpoint = %candidate, "Requested endpoint is not registered");
            WorkloadBinding::Default
        }
    }
}

impl Default for WorkloadSelector {
    fn default() -> Self {
        Self::new(RUNTIME_OVERRIDE_LABEL)
    }
}

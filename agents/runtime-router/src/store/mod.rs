//! Persistence module
//!
//! Documents the registry survives restarts with: the registry state record
//! and the user-supplied endpoint allowlist. Live client handles are never
//! persisted; stored endpoints are re-dialed on load.

pub mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PersistenceError;
use crate::runtime::endpoint::EndpointAddress;

pub use file::FileRegistryStore;

/// Serializable view of the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Known endpoints in registration order
    pub addresses: Vec<EndpointAddress>,
    /// Per-endpoint connection metadata
    #[serde(default)]
    pub endpoints: Vec<EndpointRecord>,
    /// Shared freshness period
    pub period_ms: u64,
}

impl RegistryRecord {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Connection metadata for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub address: EndpointAddress,
    pub last_active: DateTime<Utc>,
}

/// Loads and saves registry documents
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Prior registry state, `None` when nothing was saved yet
    async fn load_state(&self) -> Result<Option<RegistryRecord>, PersistenceError>;

    /// Persist registry state
    async fn save_state(&self, record: &RegistryRecord) -> Result<(), PersistenceError>;

    /// User-supplied endpoint allowlist, `None` when absent
    async fn load_allowlist(&self) -> Result<Option<Vec<String>>, PersistenceError>;
}

//! Connection Registry
//!
//! Caches one runtime/image client pair per endpoint address, redials pairs
//! the freshness evaluator deems stale, and keeps the shared freshness period.
//!
//! Locking: the structural state (ordered addresses, pairs, period) sits
//! behind a short `parking_lot::RwLock` that is never held across an await.
//! Dials are serialized per address by an async slot mutex, so at most one
//! dial per address is in flight and different addresses never wait on each
//! other.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::freshness::is_fresh;
use crate::error::RegistryError;
use crate::runtime::adapter::{EndpointConnector, ImageService, RuntimeService};
use crate::runtime::endpoint::EndpointAddress;
use crate::store::{EndpointRecord, RegistryRecord};

/// Freshness period a new registry starts with
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

/// Runtime and image handles dialed together for one endpoint
#[derive(Clone)]
pub struct ConnectionPair {
    runtime: Arc<dyn RuntimeService>,
    image: Arc<dyn ImageService>,
    last_active: DateTime<Utc>,
    generation: u64,
}

impl ConnectionPair {
    pub fn runtime(&self) -> &Arc<dyn RuntimeService> {
        &self.runtime
    }

    pub fn image(&self) -> &Arc<dyn ImageService> {
        &self.image
    }

    /// When this pair was dialed
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Registry-wide dial sequence number; a replacement always has a higher one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether both handles are the very same objects as `other`'s
    pub fn same_handles(&self, other: &ConnectionPair) -> bool {
        Arc::ptr_eq(&self.runtime, &other.runtime) && Arc::ptr_eq(&self.image, &other.image)
    }

    fn release(&self) {
        self.runtime.release();
        self.image.release();
    }
}

impl fmt::Debug for ConnectionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPair")
            .field("endpoint", self.runtime.endpoint())
            .field("runtime_type", &self.runtime.runtime_type())
            .field("last_active", &self.last_active)
            .field("generation", &self.generation)
            .finish()
    }
}

struct RegistryState {
    order: Vec<EndpointAddress>,
    pairs: HashMap<EndpointAddress, ConnectionPair>,
    period: Duration,
}

impl RegistryState {
    /// Raise the period to `period` if it is longer
    fn ratchet(&mut self, period: Duration) -> bool {
        if self.period < period {
            info!(
                from_ms = self.period.as_millis() as u64,
                to_ms = period.as_millis() as u64,
                "Freshness period raised"
            );
            self.period = period;
            return true;
        }
        false
    }
}

enum Lookup {
    Fresh(ConnectionPair),
    Stale(u64),
    Unknown,
}

/// Registry of runtime endpoints and their cached client pairs
pub struct Registry {
    connector: Arc<dyn EndpointConnector>,
    clock: Arc<dyn Clock>,
    state: RwLock<RegistryState>,
    slots: DashMap<EndpointAddress, Arc<tokio::sync::Mutex<()>>>,
    generations: AtomicU64,
}

impl Registry {
    /// Create an empty registry dialing through `connector`
    pub fn new(connector: Arc<dyn EndpointConnector>, period: Duration) -> Self {
        Self {
            connector,
            clock: Arc::new(SystemClock),
            state: RwLock::new(RegistryState {
                order: Vec::new(),
                pairs: HashMap::new(),
                period,
            }),
            slots: DashMap::new(),
            generations: AtomicU64::new(0),
        }
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current freshness period
    pub fn period(&self) -> Duration {
        self.state.read().period
    }

    /// Raise the freshness period; it never decreases. Returns whether it changed.
    pub fn set_freshness_period(&self, period: Duration) -> bool {
        self.state.write().ratchet(period)
    }

    /// Whether `address` has ever been resolved successfully
    pub fn is_known(&self, address: &EndpointAddress) -> bool {
        self.state.read().pairs.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known addresses in registration order
    pub fn addresses(&self) -> Vec<EndpointAddress> {
        self.state.read().order.clone()
    }

    /// Consistent copy of every known address and its current pair
    pub fn snapshot(&self) -> Vec<(EndpointAddress, ConnectionPair)> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|address| {
                state
                    .pairs
                    .get(address)
                    .map(|pair| (address.clone(), pair.clone()))
            })
            .collect()
    }

    /// Resolve clients for a runtime/image endpoint pair. Both must name the
    /// same backend.
    pub async fn resolve(
        &self,
        runtime_endpoint: &str,
        image_endpoint: &str,
        timeout: Duration,
    ) -> Result<ConnectionPair, RegistryError> {
        if runtime_endpoint != image_endpoint {
            warn!(
                runtime = %runtime_endpoint,
                image = %image_endpoint,
                "Runtime and image endpoints differ"
            );
            return Err(RegistryError::ConfigurationMismatch {
                runtime: runtime_endpoint.to_string(),
                image: image_endpoint.to_string(),
            });
        }

        let address = EndpointAddress::new(runtime_endpoint)?;
        self.resolve_address(&address, timeout).await
    }

    /// Return the cached pair for `address` if it is fresh enough for
    /// `timeout`, otherwise dial a new one
    pub async fn resolve_address(
        &self,
        address: &EndpointAddress,
        timeout: Duration,
    ) -> Result<ConnectionPair, RegistryError> {
        let observed = match self.lookup(address, timeout) {
            Lookup::Fresh(pair) => return Ok(pair),
            Lookup::Stale(generation) => Some(generation),
            Lookup::Unknown => None,
        };

        let slot = self
            .slots
            .entry(address.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _dialing = slot.lock().await;

        // Another caller dialed while we queued for the slot: take its pair
        let current = self.state.read().pairs.get(address).cloned();
        if let Some(pair) = &current {
            if Some(pair.generation) != observed {
                debug!(address = %address, generation = pair.generation, "Using concurrently dialed pair");
                return Ok(pair.clone());
            }
        }

        debug!(address = %address, timeout_ms = timeout.as_millis() as u64, "Dialing endpoint");
        let (runtime, image) = match self.connector.dial(address, timeout).await {
            Ok(clients) => clients,
            Err(source) => {
                warn!(address = %address, error = %source, "Failed to dial endpoint");
                if current.is_none() {
                    self.forget_slot(address, &slot);
                }
                return Err(RegistryError::Connect {
                    address: address.clone(),
                    source,
                });
            }
        };

        // A replacement is always newer than what it replaces, even if the
        // wall clock stepped back
        let mut last_active = self.clock.now();
        if let Some(previous) = &current {
            if last_active <= previous.last_active {
                last_active = previous.last_active + chrono::Duration::nanoseconds(1);
            }
        }

        let pair = ConnectionPair {
            runtime,
            image,
            last_active,
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
        };

        let superseded = {
            let mut state = self.state.write();
            let previous = state.pairs.insert(address.clone(), pair.clone());
            if previous.is_none() {
                state.order.push(address.clone());
            }
            state.ratchet(timeout);
            previous
        };

        match superseded {
            Some(previous) => {
                previous.release();
                info!(
                    address = %address,
                    generation = pair.generation,
                    "Endpoint reconnected"
                );
            }
            None => info!(address = %address, "Endpoint registered"),
        }

        Ok(pair)
    }

    /// Runtime handle of a registered endpoint, refreshed with the current
    /// period. `None` for unknown endpoints or when redialing fails.
    pub async fn runtime_for(&self, address: &EndpointAddress) -> Option<Arc<dyn RuntimeService>> {
        self.registered_pair(address)
            .await
            .map(|pair| pair.runtime.clone())
    }

    /// Image handle of a registered endpoint, refreshed with the current
    /// period. `None` for unknown endpoints or when redialing fails.
    pub async fn image_for(&self, address: &EndpointAddress) -> Option<Arc<dyn ImageService>> {
        self.registered_pair(address)
            .await
            .map(|pair| pair.image.clone())
    }

    async fn registered_pair(&self, address: &EndpointAddress) -> Option<ConnectionPair> {
        if !self.is_known(address) {
            debug!(address = %address, "Endpoint is not registered");
            return None;
        }
        self.resolve_address(address, self.period()).await.ok()
    }

    /// Serializable view of the registry, without live handles
    pub fn persisted_state(&self) -> RegistryRecord {
        let state = self.state.read();
        RegistryRecord {
            addresses: state.order.clone(),
            endpoints: state
                .order
                .iter()
                .filter_map(|address| {
                    state.pairs.get(address).map(|pair| EndpointRecord {
                        address: address.clone(),
                        last_active: pair.last_active,
                    })
                })
                .collect(),
            period_ms: state.period.as_millis() as u64,
        }
    }

    /// Release every cached pair. Addresses stay known; handles fail until
    /// the endpoint is redialed.
    pub fn release_all(&self) {
        for (address, pair) in self.snapshot() {
            pair.release();
            debug!(address = %address, "Connection pair released");
        }
    }

    /// Drop the dial slot of an address that never registered, unless
    /// other callers are queued on it
    fn forget_slot(&self, address: &EndpointAddress, slot: &Arc<tokio::sync::Mutex<()>>) {
        let removed = self.slots.remove_if(address, |_, held| {
            Arc::ptr_eq(held, slot) && Arc::strong_count(held) == 2
        });
        if removed.is_some() {
            debug!(address = %address, "Dial slot dropped");
        }
    }

    fn lookup(&self, address: &EndpointAddress, timeout: Duration) -> Lookup {
        let state = self.state.read();
        match state.pairs.get(address) {
            Some(pair) if is_fresh(state.period, timeout, pair.last_active, self.clock.now()) => {
                Lookup::Fresh(pair.clone())
            }
            Some(pair) => {
                debug!(address = %address, "Cached pair is stale");
                Lookup::Stale(pair.generation)
            }
            None => Lookup::Unknown,
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("endpoints", &state.order)
            .field("period", &state.period)
            .finish()
    }
}

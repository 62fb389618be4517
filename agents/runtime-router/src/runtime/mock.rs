//! In-memory connector and clock used by the unit tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConnectError;
use crate::registry::clock::Clock;
use crate::runtime::adapter::{DialedClients, EndpointConnector, ImageService, RuntimeService};
use crate::runtime::endpoint::EndpointAddress;

pub struct MockRuntime {
    endpoint: EndpointAddress,
    pub released: AtomicBool,
}

#[async_trait]
impl RuntimeService for MockRuntime {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    fn runtime_type(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.released.load(Ordering::SeqCst))
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

pub struct MockImage {
    endpoint: EndpointAddress,
    pub released: AtomicBool,
}

impl ImageService for MockImage {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Connector that records every dial and hands out mock handles
#[derive(Default)]
pub struct MockConnector {
    dials: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    issued: Mutex<Vec<(Arc<MockRuntime>, Arc<MockImage>)>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn fail(&self, address: &str) {
        self.failing.lock().insert(address.to_string());
    }

    pub fn recover(&self, address: &str) {
        self.failing.lock().remove(address);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Handles in the order they were issued
    pub fn issued(&self) -> Vec<(Arc<MockRuntime>, Arc<MockImage>)> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl EndpointConnector for MockConnector {
    async fn dial(
        &self,
        address: &EndpointAddress,
        _timeout: Duration,
    ) -> std::result::Result<DialedClients, ConnectError> {
        self.dials.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(address.as_str()) {
            return Err(ConnectError::Transport(anyhow!(
                "connection refused: {}",
                address
            )));
        }

        let runtime = Arc::new(MockRuntime {
            endpoint: address.clone(),
            released: AtomicBool::new(false),
        });
        let image = Arc::new(MockImage {
            endpoint: address.clone(),
            released: AtomicBool::new(false),
        });
        self.issued.lock().push((runtime.clone(), image.clone()));

        Ok((
            runtime as Arc<dyn RuntimeService>,
            image as Arc<dyn ImageService>,
        ))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock();
        *now -= chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

pub fn addr(s: &str) -> EndpointAddress {
    EndpointAddress::new(s).unwrap()
}

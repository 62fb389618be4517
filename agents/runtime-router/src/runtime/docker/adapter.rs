//! Docker Connector
//!
//! EndpointConnector implementation for the Docker Engine API using the
//! bollard library. One dialed client backs both the runtime and the image
//! handle of an endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bollard::Docker;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ConnectError;
use crate::runtime::adapter::{DialedClients, EndpointConnector, ImageService, RuntimeService};
use crate::runtime::endpoint::EndpointAddress;

/// Dials Docker-compatible endpoints over unix sockets
#[derive(Debug, Default, Clone)]
pub struct DockerConnector;

impl DockerConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EndpointConnector for DockerConnector {
    async fn dial(
        &self,
        address: &EndpointAddress,
        timeout: Duration,
    ) -> std::result::Result<DialedClients, ConnectError> {
        let socket = address
            .socket_path()
            .ok_or_else(|| ConnectError::Unsupported {
                address: address.to_string(),
            })?;

        let timeout_secs = timeout.as_secs().max(1);
        let client = Docker::connect_with_socket(socket, timeout_secs, bollard::API_DEFAULT_VERSION)
            .map_err(|e| ConnectError::Transport(e.into()))?;

        // connect_with_socket does no I/O, so confirm the backend answers
        match tokio::time::timeout(timeout, client.ping()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ConnectError::Transport(e.into())),
            Err(_) => return Err(ConnectError::Timeout { timeout }),
        }

        debug!(address = %address, "Docker endpoint dialed");
        let shared = Arc::new(SharedClient {
            endpoint: address.clone(),
            client: RwLock::new(Some(client)),
        });

        let runtime: Arc<dyn RuntimeService> = Arc::new(DockerRuntimeService {
            shared: shared.clone(),
        });
        let image: Arc<dyn ImageService> = Arc::new(DockerImageService { shared });
        Ok((runtime, image))
    }
}

/// Client shared by the two handles of one endpoint
struct SharedClient {
    endpoint: EndpointAddress,
    client: RwLock<Option<Docker>>,
}

impl SharedClient {
    fn client(&self) -> Result<Docker> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| anyhow!("connection to {} has been released", self.endpoint))
    }

    fn release(&self) {
        if self.client.write().take().is_some() {
            debug!(address = %self.endpoint, "Docker client released");
        }
    }
}

/// Runtime-service handle backed by the Docker Engine API
pub struct DockerRuntimeService {
    shared: Arc<SharedClient>,
}

#[async_trait]
impl RuntimeService for DockerRuntimeService {
    fn endpoint(&self) -> &EndpointAddress {
        &self.shared.endpoint
    }

    fn runtime_type(&self) -> &str {
        "docker"
    }

    async fn health_check(&self) -> Result<bool> {
        let client = self.shared.client()?;
        match client.ping().await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(address = %self.shared.endpoint, error = %e, "Docker health check failed");
                Ok(false)
            }
        }
    }

    fn release(&self) {
        self.shared.release();
    }
}

/// Image-service handle backed by the Docker Engine API
pub struct DockerImageService {
    shared: Arc<SharedClient>,
}

impl ImageService for DockerImageService {
    fn endpoint(&self) -> &EndpointAddress {
        &self.shared.endpoint
    }

    fn release(&self) {
        self.shared.release();
    }
}

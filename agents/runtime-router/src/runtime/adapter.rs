//! Runtime Client Traits
//!
//! Defines the runtime-service and image-service handles the registry hands
//! out, and the connector that dials both for one endpoint.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConnectError;
use crate::runtime::endpoint::EndpointAddress;

/// Runtime-service handle for one endpoint
#[async_trait]
pub trait RuntimeService: Send + Sync {
    /// Endpoint this handle was dialed for
    fn endpoint(&self) -> &EndpointAddress;

    /// Get the runtime type name
    fn runtime_type(&self) -> &str;

    /// Active liveness probe. The registry never calls this; freshness is
    /// purely time based.
    async fn health_check(&self) -> Result<bool>;

    /// Release the underlying connection. Further calls fail.
    fn release(&self);
}

/// Image-service handle for one endpoint
pub trait ImageService: Send + Sync {
    /// Endpoint this handle was dialed for
    fn endpoint(&self) -> &EndpointAddress;

    /// Release the underlying connection. Further calls fail.
    fn release(&self);
}

/// Runtime and image handles dialed together for one endpoint
pub type DialedClients = (Arc<dyn RuntimeService>, Arc<dyn ImageService>);

/// Produces client handles for an endpoint address
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    /// Dial both services of `address`, giving up after `timeout`
    async fn dial(
        &self,
        address: &EndpointAddress,
        timeout: Duration,
    ) -> std::result::Result<DialedClients, ConnectError>;
}

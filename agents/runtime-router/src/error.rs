//! Error types
//!
//! Library-level errors for the registry, the endpoint connectors and the
//! persistence layer. None of these are fatal to the host process.

use std::time::Duration;
use thiserror::Error;

use crate::runtime::endpoint::EndpointAddress;

/// Failure to produce a runtime/image client pair for an endpoint
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The backend did not answer within the caller's timeout
    #[error("endpoint did not respond within {timeout:?}")]
    Timeout { timeout: Duration },

    /// The connector cannot speak to this kind of address
    #[error("unsupported endpoint address: {address}")]
    Unsupported { address: String },

    /// Transport-level failure reported by the client library
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Errors surfaced by the connection registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Runtime and image endpoints must name the same backend
    #[error("runtime endpoint {runtime} and image endpoint {image} differ")]
    ConfigurationMismatch { runtime: String, image: String },

    /// Dialing the endpoint failed; nothing was committed
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: EndpointAddress,
        #[source]
        source: ConnectError,
    },

    /// Endpoint addresses must be non-empty
    #[error("endpoint address must not be empty")]
    InvalidAddress,
}

/// Errors from loading or saving registry documents
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize registry state: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl RegistryError {
    /// Whether retrying on the next sync cycle can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Connect { .. })
    }
}

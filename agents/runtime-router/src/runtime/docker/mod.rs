//! Docker Runtime Module
//!
//! Provides the Docker Engine API implementation of the EndpointConnector trait.

pub mod adapter;

pub use adapter::DockerConnector;

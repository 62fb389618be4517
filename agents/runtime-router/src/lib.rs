//! Runtime Router Library
//!
//! This crate lets a host route container workloads across several runtime
//! backends instead of a single hard-wired socket. It provides the connection
//! registry with its freshness policy and background refresher, the
//! label-driven workload selector, and persistence of registry state.

pub mod cli;
pub mod error;
pub mod hub;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod workload;

// Re-exports for convenience
pub use cli::config::Config;
pub use error::{ConnectError, PersistenceError, RegistryError};
pub use hub::{HubOptions, RuntimeHub};
pub use registry::{ConnectionPair, Refresher, Registry};
pub use runtime::adapter::{EndpointConnector, ImageService, RuntimeService};
pub use runtime::docker::adapter::DockerConnector;
pub use runtime::endpoint::EndpointAddress;
pub use store::{FileRegistryStore, RegistryStore};
pub use workload::{WorkloadBinding, WorkloadSelector};

//! Runtime module
//!
//! Client handles for container runtime backends and the connectors that
//! dial them (Docker, containerd, CRI-O, ...).

pub mod adapter;
pub mod docker;
pub mod endpoint;

#[cfg(test)]
pub(crate) mod mock;

//! CLI module
//!
//! Configuration consumed by the router binary.

pub mod config;

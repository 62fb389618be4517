//! Workload module
//!
//! Per-workload routing decisions on top of the connection registry.

pub mod selector;

pub use selector::{encode_label_value, WorkloadBinding, WorkloadSelector, RUNTIME_OVERRIDE_LABEL};

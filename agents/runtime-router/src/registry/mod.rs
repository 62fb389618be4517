//! Registry module
//!
//! The connection registry, its freshness policy, and the background
//! refresher that keeps cached pairs from going stale.

pub mod clock;
pub mod connections;
pub mod freshness;
pub mod refresher;

pub use connections::{ConnectionPair, Registry, DEFAULT_PERIOD};
pub use refresher::{Refresher, SweepReport};

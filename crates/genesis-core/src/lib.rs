//! Genesis Core - Infrastructure primitives for the genesis audio engine
//!
//! - [`queue`]: lock-free bounded handoff queue between worker and
//!   real-time threads
//! - [`order_key`]: fractional keys for stable ordering of graph nodes and
//!   timeline entries

pub mod config;
pub mod order_key;
pub mod queue;
pub mod stress;

pub use order_key::{OrderKey, OrderKeyError};
pub use queue::{ConcurrentBoundedQueue, QueueError, QueueResult};

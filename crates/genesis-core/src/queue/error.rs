//! Queue setup error types

use thiserror::Error;

/// Errors reported while sizing a [`ConcurrentBoundedQueue`](super::ConcurrentBoundedQueue)
///
/// Everything that can go wrong once the queue is shared between threads is
/// a contract violation and panics instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Capacity is negative, zero, or too large for the 32-bit item counter
    #[error("Invalid queue capacity: {0} (expected 1..={max})", max = i32::MAX)]
    InvalidCapacity(i64),

    /// Slot storage could not be allocated
    #[error("Out of memory allocating {capacity} queue slots")]
    NoMemory { capacity: usize },
}

/// Result type for queue setup
pub type QueueResult<T> = Result<T, QueueError>;

//! Queue error types

use thiserror::Error;

/// Errors surfaced by [`ActionQueue::enqueue`].
///
/// Runtime failures during draining never surface here; they are retried
/// and eventually reported through the permanent-failure channel.
///
/// [`ActionQueue::enqueue`]: crate::queue::ActionQueue::enqueue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is at its configured capacity; the action was rejected
    /// and nothing was persisted.
    #[error("Action queue is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
}

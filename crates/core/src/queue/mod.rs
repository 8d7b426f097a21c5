//! Durable, retryable action queue

mod core;
mod errors;

pub use self::core::ActionQueue;
pub use errors::QueueError;

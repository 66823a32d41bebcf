//! Redis Streams task queue.
//!
//! This crate provides:
//! - Task enqueueing with idempotency dedup
//! - Consumer-group consumption with late acknowledgment
//! - Pending-entry claiming for crash recovery
//! - Retry counters and a dead-letter stream

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig};

//! Sink implementations

pub mod console;
pub mod multi;
pub mod queue;
pub mod rotating_file;

pub use console::ConsoleSink;
pub use multi::MultiSink;
pub use queue::{
    ExpiryPolicy, MemoryQueue, QueueClient, QueueConfig, QueueSink, DEFAULT_QUEUE_KEY,
    DEFAULT_QUEUE_TTL,
};
#[cfg(feature = "redis-queue")]
pub use queue::RedisQueue;
pub use rotating_file::{RotatingFileSink, RotationPolicy};

pub use crate::core::Sink;

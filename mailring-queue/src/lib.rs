//! Durable FIFO lists backing the send engine.
//!
//! The engine only ever sees [`QueueStore`]; entries are encoded batches.

pub mod backends;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod store;

pub use backends::{MemoryQueueStore, Operation, RedisQueueStore, TestQueueStore};
pub use config::QueueConfig;
pub use error::{QueueError, Result, SerializationError};
pub use keys::Keys;
pub use store::QueueStore;

/// An encoded batch as held by the store
pub type Entry = Vec<u8>;

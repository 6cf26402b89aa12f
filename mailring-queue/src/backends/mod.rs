//! Queue store implementations
//!
//! - `memory`: in-process lists for development and tests
//! - `test`: memory lists plus notification and failure injection
//! - `redis`: Redis lists for production use

pub mod memory;
pub mod redis;

pub use memory::MemoryQueueStore;
pub use redis::RedisQueueStore;
pub use test::{Operation, TestQueueStore};

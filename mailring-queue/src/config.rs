use std::sync::Arc;

use serde::Deserialize;

use crate::{
    backends::{MemoryQueueStore, RedisQueueStore},
    store::QueueStore,
};

/// Configuration for the queue store
///
/// # Examples
///
/// Redis in RON config:
/// ```ron
/// Mailring (
///     queue: Redis(
///         url: "redis://127.0.0.1/",
///     ),
/// )
/// ```
///
/// Memory with a capacity limit:
/// ```ron
/// Mailring (
///     queue: Memory(
///         capacity: Some(1000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum QueueConfig {
    /// Lists kept in process memory, lost on exit
    Memory {
        /// Maximum number of entries across all lists (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
    /// Lists kept in a Redis server
    Redis { url: String },
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::Memory { capacity: None }
    }
}

impl QueueConfig {
    /// Build the configured store
    ///
    /// # Errors
    /// If a Redis connection cannot be established
    pub async fn into_store(self) -> crate::Result<Arc<dyn QueueStore>> {
        Ok(match self {
            Self::Memory { capacity } => capacity.map_or_else(
                || Arc::new(MemoryQueueStore::new()) as Arc<dyn QueueStore>,
                |capacity| Arc::new(MemoryQueueStore::with_capacity(capacity)),
            ),
            Self::Redis { url } => Arc::new(RedisQueueStore::connect(&url).await?),
        })
    }
}

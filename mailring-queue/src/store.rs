use async_trait::async_trait;

use crate::Entry;

/// Durable named FIFO lists.
///
/// Lists have a head and a tail. Producers insert at the head and consumers
/// take from the tail, so an entry pushed first is popped first. Every method
/// is atomic with respect to the others for the keys it touches.
///
/// A key that was never written behaves as an empty list.
#[async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug {
    /// Insert `entries` at the head of `key`, one after the other.
    ///
    /// The last element of `entries` ends up at the head, so popping yields
    /// them in the order given. Returns the length of the list afterwards.
    async fn push(&self, key: &str, entries: Vec<Entry>) -> crate::Result<usize>;

    /// Remove and return the entry at the tail of `key`
    async fn pop(&self, key: &str) -> crate::Result<Option<Entry>>;

    /// Every entry of `key`, head first
    async fn read_all(&self, key: &str) -> crate::Result<Vec<Entry>>;

    async fn len(&self, key: &str) -> crate::Result<usize>;

    /// Atomically move the tail of `from` onto the head of `to`, returning it
    async fn move_tail_to_head(&self, from: &str, to: &str) -> crate::Result<Option<Entry>>;

    /// Atomically move the tail of `from` onto the tail of `to`, returning it
    ///
    /// The moved entry becomes the next one popped from `to`.
    async fn move_tail_to_tail(&self, from: &str, to: &str) -> crate::Result<Option<Entry>>;

    /// Overwrite the entry at `index` (0 is the head) of `key`
    async fn replace(&self, key: &str, index: usize, entry: Entry) -> crate::Result<()>;

    /// Atomically read every entry of `key` (head first) and delete the list
    async fn take_all(&self, key: &str) -> crate::Result<Vec<Entry>>;
}

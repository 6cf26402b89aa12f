use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mailring_common::internal;

use crate::{Entry, QueueError, store::QueueStore};

/// In-memory queue store
///
/// Lists live in a `HashMap` of `VecDeque`s behind a single `Mutex`, which
/// makes every operation (including the two-key move) trivially atomic. Index
/// 0 of a deque is the head of the list.
///
/// # Capacity Management
/// An optional capacity bounds the total number of entries across all lists.
/// Pushes that would exceed it fail with [`QueueError::CapacityExceeded`];
/// moves between lists never change the total and always succeed.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    pub(crate) lists: Arc<Mutex<HashMap<String, VecDeque<Entry>>>>,
    capacity: Option<usize>,
}

impl MemoryQueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lists: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Total number of entries over every list
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lists
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(VecDeque::len)
            .sum()
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Drop every list
    pub fn clear(&self) {
        self.lists
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, key: &str, entries: Vec<Entry>) -> crate::Result<usize> {
        let mut lists = self.lists.lock()?;

        if let Some(capacity) = self.capacity {
            let len = lists.values().map(VecDeque::len).sum::<usize>();
            if len + entries.len() > capacity {
                internal!(
                    level = WARN,
                    key,
                    len,
                    capacity,
                    rejected = entries.len(),
                    "Queue store is full, rejecting push"
                );
                return Err(QueueError::CapacityExceeded { len, capacity });
            }
        }

        let list = lists.entry(key.to_string()).or_default();
        for entry in entries {
            list.push_front(entry);
        }

        Ok(list.len())
    }

    async fn pop(&self, key: &str) -> crate::Result<Option<Entry>> {
        let mut lists = self.lists.lock()?;
        let entry = lists.get_mut(key).and_then(VecDeque::pop_back);

        if lists.get(key).is_some_and(VecDeque::is_empty) {
            lists.remove(key);
        }

        Ok(entry)
    }

    async fn read_all(&self, key: &str) -> crate::Result<Vec<Entry>> {
        Ok(self
            .lists
            .lock()?
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> crate::Result<usize> {
        Ok(self.lists.lock()?.get(key).map_or(0, VecDeque::len))
    }

    async fn move_tail_to_head(&self, from: &str, to: &str) -> crate::Result<Option<Entry>> {
        let mut lists = self.lists.lock()?;

        let Some(entry) = lists.get_mut(from).and_then(VecDeque::pop_back) else {
            return Ok(None);
        };

        if lists.get(from).is_some_and(VecDeque::is_empty) {
            lists.remove(from);
        }

        lists
            .entry(to.to_string())
            .or_default()
            .push_front(entry.clone());

        Ok(Some(entry))
    }

    async fn move_tail_to_tail(&self, from: &str, to: &str) -> crate::Result<Option<Entry>> {
        let mut lists = self.lists.lock()?;

        let Some(entry) = lists.get_mut(from).and_then(VecDeque::pop_back) else {
            return Ok(None);
        };

        if lists.get(from).is_some_and(VecDeque::is_empty) {
            lists.remove(from);
        }

        lists
            .entry(to.to_string())
            .or_default()
            .push_back(entry.clone());

        Ok(Some(entry))
    }

    async fn replace(&self, key: &str, index: usize, entry: Entry) -> crate::Result<()> {
        let mut lists = self.lists.lock()?;

        let slot = lists
            .get_mut(key)
            .and_then(|list| list.get_mut(index))
            .ok_or_else(|| QueueError::OutOfRange {
                key: key.to_string(),
                index,
            })?;
        *slot = entry;

        Ok(())
    }

    async fn take_all(&self, key: &str) -> crate::Result<Vec<Entry>> {
        Ok(self
            .lists
            .lock()?
            .remove(key)
            .map(Vec::from)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn entries(items: &[&str]) -> Vec<Entry> {
        items.iter().map(|item| item.as_bytes().to_vec()).collect()
    }

    #[tokio::test]
    async fn fifo_order() {
        let store = MemoryQueueStore::new();

        assert_eq!(store.push("q", entries(&["a", "b"])).await.unwrap(), 2);
        assert_eq!(store.push("q", entries(&["c"])).await.unwrap(), 3);

        assert_eq!(store.read_all("q").await.unwrap(), entries(&["c", "b", "a"]));
        assert_eq!(store.pop("q").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.pop("q").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.pop("q").await.unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.pop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_key_is_empty() {
        let store = MemoryQueueStore::new();

        assert_eq!(store.len("nothing").await.unwrap(), 0);
        assert!(store.read_all("nothing").await.unwrap().is_empty());
        assert!(store.take_all("nothing").await.unwrap().is_empty());
        assert_eq!(store.move_tail_to_head("nothing", "q").await.unwrap(), None);
        assert_eq!(store.len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn move_takes_oldest() {
        let store = MemoryQueueStore::new();
        store.push("from", entries(&["first", "second"])).await.unwrap();
        store.push("to", entries(&["existing"])).await.unwrap();

        let moved = store.move_tail_to_head("from", "to").await.unwrap();

        assert_eq!(moved, Some(b"first".to_vec()));
        assert_eq!(store.read_all("from").await.unwrap(), entries(&["second"]));
        assert_eq!(
            store.read_all("to").await.unwrap(),
            entries(&["first", "existing"])
        );
    }

    #[tokio::test]
    async fn hand_back_is_next_out() {
        let store = MemoryQueueStore::new();
        store.push("main", entries(&["older", "newer"])).await.unwrap();
        store.push("provider", entries(&["claimed"])).await.unwrap();

        store.move_tail_to_tail("provider", "main").await.unwrap();

        assert_eq!(store.len("provider").await.unwrap(), 0);
        assert_eq!(store.pop("main").await.unwrap(), Some(b"claimed".to_vec()));
        assert_eq!(store.pop("main").await.unwrap(), Some(b"older".to_vec()));
    }

    #[tokio::test]
    async fn replace_and_take() {
        let store = MemoryQueueStore::new();
        store.push("q", entries(&["a", "b"])).await.unwrap();

        store.replace("q", 0, b"z".to_vec()).await.unwrap();
        assert_eq!(store.read_all("q").await.unwrap(), entries(&["z", "a"]));

        assert!(matches!(
            store.replace("q", 5, b"x".to_vec()).await,
            Err(QueueError::OutOfRange { index: 5, .. })
        ));
        assert!(matches!(
            store.replace("other", 0, b"x".to_vec()).await,
            Err(QueueError::OutOfRange { .. })
        ));

        assert_eq!(store.take_all("q").await.unwrap(), entries(&["z", "a"]));
        assert_eq!(store.len("q").await.unwrap(), 0);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn capacity_rejection_is_logged() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = MemoryQueueStore::with_capacity(1);
        store.push("full", entries(&["1"])).await.unwrap();
        assert!(store.push("full", entries(&["2", "3"])).await.is_err());

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Queue store is full, rejecting push"));
        assert!(output.contains("rejected=2"));
    }

    #[tokio::test]
    async fn capacity() {
        let store = MemoryQueueStore::with_capacity(2);
        store.push("a", entries(&["1"])).await.unwrap();
        store.push("b", entries(&["2"])).await.unwrap();

        let err = store.push("a", entries(&["3"])).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::CapacityExceeded {
                len: 2,
                capacity: 2
            }
        ));

        assert!(store.move_tail_to_head("a", "b").await.unwrap().is_some());
        assert_eq!(store.total(), 2);
    }
}

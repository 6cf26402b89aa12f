use std::fmt;

use async_trait::async_trait;
use mailring_common::internal;
use redis::{AsyncCommands, Direction, aio::ConnectionManager};

use crate::{Entry, store::QueueStore};

/// Redis backed queue store
///
/// Each list is a Redis list. The head is the left end, so pushes use `LPUSH`,
/// pops use `RPOP`, claiming uses `RPOPLPUSH` and handing an entry back uses
/// `LMOVE ... RIGHT RIGHT` (Redis 6.2 or later). The connection manager
/// reconnects on its own; each operation works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisQueueStore {
    connection: ConnectionManager,
    url: String,
}

impl fmt::Debug for RedisQueueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisQueueStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RedisQueueStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1/`)
    ///
    /// # Errors
    /// If the url is malformed or the server cannot be reached
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await.inspect_err(|err| {
            internal!(level = ERROR, error = %err, "Unable to connect to Redis queue store");
        })?;

        internal!(level = INFO, "Connected to Redis queue store");

        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push(&self, key: &str, entries: Vec<Entry>) -> crate::Result<usize> {
        let mut conn = self.connection();

        if entries.is_empty() {
            return Ok(conn.llen(key).await?);
        }

        Ok(conn.lpush(key, entries).await?)
    }

    async fn pop(&self, key: &str) -> crate::Result<Option<Entry>> {
        Ok(self.connection().rpop(key, None).await?)
    }

    async fn read_all(&self, key: &str) -> crate::Result<Vec<Entry>> {
        Ok(self.connection().lrange(key, 0, -1).await?)
    }

    async fn len(&self, key: &str) -> crate::Result<usize> {
        Ok(self.connection().llen(key).await?)
    }

    async fn move_tail_to_head(&self, from: &str, to: &str) -> crate::Result<Option<Entry>> {
        Ok(self.connection().rpoplpush(from, to).await?)
    }

    async fn move_tail_to_tail(&self, from: &str, to: &str) -> crate::Result<Option<Entry>> {
        Ok(self
            .connection()
            .lmove(from, to, Direction::Right, Direction::Right)
            .await?)
    }

    async fn replace(&self, key: &str, index: usize, entry: Entry) -> crate::Result<()> {
        let index = isize::try_from(index).map_err(|_| crate::QueueError::OutOfRange {
            key: key.to_string(),
            index,
        })?;

        self.connection()
            .lset::<_, _, ()>(key, index, entry)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn take_all(&self, key: &str) -> crate::Result<Vec<Entry>> {
        let mut conn = self.connection();

        let (entries,): (Vec<Entry>,) = redis::pipe()
            .atomic()
            .lrange(key, 0, -1)
            .del(key)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(entries)
    }
}

//! Batches: the unit of work that moves through the queues.
//!
//! A submitted [`Message`] is split into one or more batches, each holding at
//! most a provider's batch limit of receivers. Providers that can only address
//! one receiver per call expand a batch into single-receiver batches and, when
//! a delivery run is interrupted, fold whatever is left back into one batch.

use std::{
    fmt::{self, Display},
    num::NonZeroUsize,
};

use serde::{Deserialize, Serialize};

use crate::{address::Recipient, message::Message};

/// Upper bound on receivers per batch regardless of what a provider declares
pub const MAX_BATCH_LIMIT: usize = 1000;

/// Identifier shared by a batch and every single-receiver batch expanded from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(ulid::Ulid);

impl BatchId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How many receivers a provider accepts per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchLimit {
    #[default]
    Unbounded,
    Max(NonZeroUsize),
}

impl BatchLimit {
    /// Interpret a declared limit.
    ///
    /// `-1` and `0` mean unbounded; anything above [`MAX_BATCH_LIMIT`] is
    /// clamped to it. Returns `None` for other negative values.
    #[must_use]
    pub fn from_declared(limit: i64) -> Option<Self> {
        match limit {
            -1 | 0 => Some(Self::Unbounded),
            limit if limit < 0 => None,
            limit => {
                let limit = usize::try_from(limit).map_or(MAX_BATCH_LIMIT, |l| l.min(MAX_BATCH_LIMIT));
                NonZeroUsize::new(limit).map(Self::Max)
            }
        }
    }

    #[must_use]
    pub const fn get(self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Max(limit) => Some(limit.get()),
        }
    }
}

impl Display for BatchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Max(limit) => write!(f, "{limit}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub message: Message,
}

impl Batch {
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            id: BatchId::generate(),
            message,
        }
    }

    #[must_use]
    pub fn receivers(&self) -> &[Recipient] {
        &self.message.receivers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.message.receivers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.message.receivers.is_empty()
    }

    /// Split a message into batches of at most `limit` receivers, in order.
    ///
    /// An unbounded limit always yields exactly one batch.
    #[must_use]
    pub fn split(mut message: Message, limit: BatchLimit) -> Vec<Self> {
        let Some(limit) = limit.get() else {
            return vec![Self::new(message)];
        };

        let receivers = std::mem::take(&mut message.receivers);
        receivers
            .chunks(limit)
            .map(|chunk| {
                Self::new(Message {
                    receivers: chunk.to_vec(),
                    ..message.clone()
                })
            })
            .collect()
    }

    /// One single-receiver batch per receiver, in order, all sharing this id.
    #[must_use]
    pub fn expand(self) -> Vec<Self> {
        let Self { id, mut message } = self;
        let receivers = std::mem::take(&mut message.receivers);

        receivers
            .into_iter()
            .map(|receiver| Self {
                id,
                message: Message {
                    receivers: vec![receiver],
                    ..message.clone()
                },
            })
            .collect()
    }

    /// Merge batches back into the first one, appending receivers in order.
    ///
    /// Returns `None` when there is nothing to fold.
    #[must_use]
    pub fn fold(batches: impl IntoIterator<Item = Self>) -> Option<Self> {
        batches.into_iter().reduce(|mut folded, batch| {
            folded.message.receivers.extend(batch.message.receivers);
            folded
        })
    }
}

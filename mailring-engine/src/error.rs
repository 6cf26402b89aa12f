use mailring_common::ValidationError;
use mailring_providers::ConfigError;
use mailring_queue::{QueueError, SerializationError};
use thiserror::Error;

/// Why a submission or start-up was refused
#[derive(Debug, Error)]
pub enum MailerError {
    /// The message is malformed; nothing was enqueued.
    #[error("Invalid message: {0}")]
    Validation(#[from] ValidationError),

    /// The queue store did not acknowledge the write; nothing was enqueued.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A batch could not be encoded; nothing was enqueued.
    #[error("Encoding error: {0}")]
    Serialization(#[from] SerializationError),

    /// The providers or engine settings are unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The mailer has been shut down.
    #[error("Mailer is shut down")]
    ShutDown,

    /// The blocking task checking the message did not complete.
    #[error("Validation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MailerError {
    /// Returns `true` if resubmitting the same message can never succeed.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns `true` if the queue store failed and resubmitting may succeed.
    #[must_use]
    pub const fn is_queue(&self) -> bool {
        matches!(self, Self::Queue(_))
    }
}

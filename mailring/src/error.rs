use std::path::PathBuf;

use mailring_engine::MailerError;
use mailring_providers::ConfigError;
use mailring_queue::QueueError;
use thiserror::Error;

/// Failure to load a configuration or bring the mailer up
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to open queue store: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Mailer(#[from] MailerError),
}

impl Error {
    /// Returns `true` if the configuration itself needs fixing, as opposed to
    /// an unreachable file or store.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::Config(_) | Self::Mailer(MailerError::Config(_))
        )
    }
}

//! Error types for provider adapters and their configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a batch into a provider request.
///
/// These never depend on the provider being healthy: the same batch would
/// fail to build on every attempt.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// An attachment could not be read.
    #[error("Unable to read attachment {filename} at {}: {source}", path.display())]
    Attachment {
        filename: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request body could not be serialized.
    #[error("Unable to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The request could not be signed.
    #[error("Unable to sign request: {0}")]
    Signing(String),

    /// The batch asks for something this provider cannot do.
    #[error("Unsupported by {provider}: {reason}")]
    Unsupported {
        provider: &'static str,
        reason: String,
    },
}

/// Invalid provider or engine configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one provider is required.
    #[error("No providers configured")]
    NoProviders,

    /// Provider names key the queues and must be unique.
    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    /// Provider names must be usable inside queue keys.
    #[error("Invalid provider name: {0:?}")]
    InvalidName(String),

    /// Batch limits are -1 (unbounded) or positive.
    #[error("Invalid batch limit {limit} for provider {provider}")]
    InvalidBatchLimit { provider: String, limit: i64 },

    /// Every provider needs something to classify responses with.
    #[error("Provider {provider} has no {kind} codes")]
    EmptyCodes {
        provider: String,
        kind: &'static str,
    },

    /// A code cannot mean both success and failure.
    #[error("Provider {provider} lists {code} as both a success and a failure")]
    AmbiguousCode { provider: String, code: String },

    /// Mailgun sends from a domain, which must be well formed.
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Provider endpoints must be absolute urls.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Send rates are whole messages per second.
    #[error("Send rate must be at least one message per second, got {0}")]
    InvalidSendRate(u32),

    /// A credential field was left blank.
    #[error("Provider {provider} is missing {field}")]
    MissingCredential {
        provider: String,
        field: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("Unable to build HTTP client: {0}")]
    Client(String),
}

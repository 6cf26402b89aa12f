//! Error types for the mailring-common crate.

use thiserror::Error;

/// Reasons a submitted message is rejected before anything is enqueued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The sender address does not match the mailbox grammar.
    #[error("Invalid sender address: {0}")]
    InvalidSender(String),

    /// No receivers were supplied.
    #[error("Message has no receivers")]
    NoReceivers,

    /// A receiver address does not match the mailbox grammar.
    #[error("Invalid receiver address at position {index}: {email}")]
    InvalidReceiver { index: usize, email: String },

    /// A receiver carries a variable that cannot be substituted.
    #[error("Invalid variable {key:?} for receiver {email}")]
    InvalidVariable { email: String, key: String },

    /// The cc address does not match the mailbox grammar.
    #[error("Invalid cc address: {0}")]
    InvalidCc(String),

    /// The bcc address does not match the mailbox grammar.
    #[error("Invalid bcc address: {0}")]
    InvalidBcc(String),

    /// The reply-to address does not match the mailbox grammar.
    #[error("Invalid reply-to address: {0}")]
    InvalidReplyTo(String),

    /// The subject is empty or only whitespace.
    #[error("Message subject is empty")]
    EmptySubject,

    /// Neither a text nor an HTML body was supplied, or a supplied part is blank.
    #[error("Invalid message body: {0}")]
    InvalidBody(&'static str),

    /// An attachment is malformed or its file cannot be found.
    #[error("Invalid attachment {filename:?}: {reason}")]
    InvalidAttachment { filename: String, reason: String },
}

impl ValidationError {
    /// Returns `true` if the error concerns one of the message's addresses.
    #[must_use]
    pub const fn is_address_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSender(_)
                | Self::NoReceivers
                | Self::InvalidReceiver { .. }
                | Self::InvalidCc(_)
                | Self::InvalidBcc(_)
                | Self::InvalidReplyTo(_)
        )
    }
}

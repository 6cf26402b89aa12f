//! Shared data model for the mailring workspace: addresses, messages,
//! batches, validation and logging.

pub mod address;
pub mod batch;
pub mod error;
pub mod logging;
pub mod message;
pub mod template;
mod validation;

pub use address::{Address, Recipient};
pub use batch::{Batch, BatchId, BatchLimit, MAX_BATCH_LIMIT};
pub use error::ValidationError;
pub use message::{Attachment, Body, Disposition, Message, MessageBuilder};
pub use tracing;

/// Lifecycle signal broadcast to long running tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}

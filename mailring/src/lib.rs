//! Queue-backed failover delivery of bulk email.
//!
//! Messages are validated, split into batches and written to a durable queue.
//! One provider at a time drains the queue; when it answers with a failure
//! code, whatever it had not sent is restored and the next configured
//! provider takes over.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use mailring::{Address, MailringConfig, Message};
//!
//! mailring::logging::init();
//! let mailer = MailringConfig::from_file("mailring.config.ron").await?.start().await?;
//! let mut events = mailer.subscribe();
//!
//! mailer
//!     .send(
//!         Message::builder()
//!             .sender(Address::new("news@example.com"))
//!             .receiver(Address::new("reader@example.com"))
//!             .subject("Hello {{name}}")
//!             .text("Hi {{name}}")
//!             .build(),
//!     )
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

pub use config::MailringConfig;
pub use error::Error;
pub use mailring_common::{
    Address, Attachment, Batch, BatchId, Body, Disposition, Message, MessageBuilder, Recipient,
    ValidationError, logging,
};
pub use mailring_engine::{Diagnostic, DiagnosticKind, EngineConfig, Event, Mailer, MailerError};
pub use mailring_providers::{Code, HttpConfig, ProviderConfig, TransportConfig};
pub use mailring_queue::QueueConfig;

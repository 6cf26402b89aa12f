//! The send engine: per-provider processing loops, batch expansion and
//! restore, and round-robin failover between providers.
//!
//! [`Mailer`] is the entry point. It owns one engine per configured provider
//! and a controller task that rotates to the next provider whenever the
//! active one answers with a failure code.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
mod failover;
mod lifecycle;
pub mod mailer;

pub use config::EngineConfig;
pub use engine::{Engine, ProviderEngine};
pub use error::MailerError;
pub use event::{Diagnostic, DiagnosticKind, Event};
pub use mailer::Mailer;

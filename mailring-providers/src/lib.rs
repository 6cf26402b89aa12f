//! Delivery provider adapters.
//!
//! Each adapter turns a [`mailring_common::Batch`] into a provider API call
//! and reports the outcome as a [`Response`]. [`ProviderSettings`] says which
//! codes mean success and which mean the provider should be abandoned.

pub mod adapter;
pub mod code;
pub mod error;
pub mod http;
pub mod mailgun;
pub mod mandrill;
pub mod rate;
pub mod sendgrid;
pub mod ses;
pub mod settings;
pub mod transport;

pub use adapter::Adapter;
pub use code::{Code, Response};
pub use error::{AdapterError, ConfigError};
pub use http::HttpConfig;
pub use settings::{Outcome, ProviderSettings};
pub use transport::{ProviderConfig, Transport, TransportConfig};

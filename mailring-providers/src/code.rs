use std::fmt;

use serde::{Deserialize, Serialize};

/// A provider's answer to a send, as seen by the engine
///
/// HTTP APIs answer with a status; Mandrill and transport level failures are
/// reported by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Status(u16),
    Named(String),
}

impl Code {
    /// The provider could not be reached
    pub const CONNECT: &'static str = "connect";
    /// The provider did not answer in time
    pub const TIMEOUT: &'static str = "timeout";
    /// The request failed for another transport level reason
    pub const TRANSPORT: &'static str = "transport";

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<u16> for Code {
    fn from(status: u16) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for Code {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// Normalised result of a provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: Code,
    /// Provider supplied detail, present on failures and on partial successes
    pub error: Option<String>,
}

impl Response {
    #[must_use]
    pub fn new(code: impl Into<Code>) -> Self {
        Self {
            code: code.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Map a reqwest failure onto the named transport codes
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Code::TIMEOUT
        } else if err.is_connect() {
            Code::CONNECT
        } else {
            Code::TRANSPORT
        };

        Self::new(code).with_error(err.to_string())
    }
}

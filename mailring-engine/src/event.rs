use std::fmt;

use mailring_common::Batch;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Info,
    Critical,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// Something went wrong, or partially wrong, while processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub data: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Info,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::Critical,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: impl fmt::Display) -> Self {
        self.data = Some(data.to_string());
        self
    }

    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.kind == DiagnosticKind::Critical
    }
}

/// Notifications published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `batch` was accepted by `provider`
    Sent { provider: String, batch: Batch },
    Error(Diagnostic),
    /// Informational, e.g. the active provider changed
    Info { message: String },
}

impl Event {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }
}

impl From<Diagnostic> for Event {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::Error(diagnostic)
    }
}

/// What an engine tells the controller
#[derive(Debug)]
pub(crate) enum Report {
    Event(Event),
    /// The engine at `index` hit a hard failure and has stopped
    Failed { index: usize },
}

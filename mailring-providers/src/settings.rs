use std::sync::LazyLock;

use mailring_common::BatchLimit;
use regex::Regex;

use crate::{Code, ConfigError};

#[allow(clippy::expect_used, reason = "The pattern is a literal")]
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("name pattern compiles"));

/// How the engine should treat a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Unknown,
}

/// Static description of one configured provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub name: String,
    pub success_codes: Vec<Code>,
    pub failure_codes: Vec<Code>,
    pub batch_limit: BatchLimit,
    pub sandbox: bool,
}

impl ProviderSettings {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success_codes: Vec::new(),
            failure_codes: Vec::new(),
            batch_limit: BatchLimit::default(),
            sandbox: false,
        }
    }

    #[must_use]
    pub fn success_codes(mut self, codes: impl IntoIterator<Item = impl Into<Code>>) -> Self {
        self.success_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn failure_codes(mut self, codes: impl IntoIterator<Item = impl Into<Code>>) -> Self {
        self.failure_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn batch_limit(mut self, limit: BatchLimit) -> Self {
        self.batch_limit = limit;
        self
    }

    #[must_use]
    pub const fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Classify a response code
    ///
    /// Success codes take precedence, although [`Self::validate`] rejects
    /// settings where the two lists overlap.
    #[must_use]
    pub fn outcome(&self, code: &Code) -> Outcome {
        if self.success_codes.contains(code) {
            Outcome::Success
        } else if self.failure_codes.contains(code) {
            Outcome::Failure
        } else {
            Outcome::Unknown
        }
    }

    /// Check the settings are usable
    ///
    /// # Errors
    /// If the name cannot key a queue, either code list is empty, or a code
    /// appears in both lists
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !NAME.is_match(&self.name) {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        if self.success_codes.is_empty() {
            return Err(ConfigError::EmptyCodes {
                provider: self.name.clone(),
                kind: "success",
            });
        }

        if self.failure_codes.is_empty() {
            return Err(ConfigError::EmptyCodes {
                provider: self.name.clone(),
                kind: "failure",
            });
        }

        if let Some(code) = self
            .success_codes
            .iter()
            .find(|code| self.failure_codes.contains(code))
        {
            return Err(ConfigError::AmbiguousCode {
                provider: self.name.clone(),
                code: code.to_string(),
            });
        }

        Ok(())
    }
}

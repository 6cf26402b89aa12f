//! Names of the lists the engine keeps in the queue store.

/// Key layout for one deployment, scoped by an optional prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    root: String,
}

impl Keys {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            root: format!("{prefix}EMAIL_SERVICE"),
        }
    }

    /// Shared FIFO fed by the mailer
    #[must_use]
    pub fn main(&self) -> String {
        format!("{}:MAIN_QUEUE", self.root)
    }

    /// Holds the batch a provider is currently working on
    #[must_use]
    pub fn provider(&self, name: &str) -> String {
        format!("{}:{name}:PROVIDER_QUEUE", self.root)
    }

    /// Single-recipient batches produced by expanding the provider's batch
    #[must_use]
    pub fn expansion(&self, name: &str) -> String {
        format!("{}:PRIVATE", self.provider(name))
    }

    /// Entries that can never be delivered by any provider
    #[must_use]
    pub fn dead_letter(&self) -> String {
        format!("{}:DEAD_LETTER", self.root)
    }
}

impl Default for Keys {
    fn default() -> Self {
        Self::new("")
    }
}

use std::{path::Path, str::FromStr};

use mailring_engine::{EngineConfig, Mailer};
use mailring_providers::{ConfigError, HttpConfig, ProviderConfig};
use mailring_queue::QueueConfig;
use serde::Deserialize;

use crate::Error;

/// Everything needed to run a mailer
///
/// ```ron
/// Mailring (
///     queue: Redis(url: "redis://127.0.0.1/"),
///     engine: (prefix: "app:", poll_interval_ms: 500),
///     http: (timeout_secs: 10),
///     providers: [
///         (name: "primary", transport: Sendgrid(api_key: "SG.xxx")),
///         (name: "backup", transport: Mailgun(api_key: "key", domain: "mg.example.com")),
///     ],
/// )
/// ```
///
/// Providers are tried in the order they are listed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename = "Mailring")]
pub struct MailringConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub providers: Vec<ProviderConfig>,
}

impl FromStr for MailringConfig {
    type Err = Error;

    fn from_str(config: &str) -> Result<Self, Self::Err> {
        Ok(ron::Options::default()
            .with_default_extension(
                ron::extensions::Extensions::IMPLICIT_SOME
                    | ron::extensions::Extensions::UNWRAP_VARIANT_NEWTYPES,
            )
            .from_str(config)?)
    }
}

impl MailringConfig {
    /// Read and parse a RON configuration file
    ///
    /// # Errors
    /// If the file cannot be read or is not a valid configuration
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let config = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;

        config.parse()
    }

    /// Build the providers, open the queue store and start a mailer
    ///
    /// # Errors
    /// If any provider is misconfigured or the queue store cannot be opened
    #[tracing::instrument(level = "debug", skip_all, fields(providers = self.providers.len()))]
    pub async fn start(self) -> Result<Mailer, Error> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders.into());
        }

        let client = self.http.client()?;
        let providers = self
            .providers
            .into_iter()
            .map(|provider| provider.build(client.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let store = self.queue.into_store().await?;

        Ok(Mailer::start(&self.engine, store, providers)?)
    }
}

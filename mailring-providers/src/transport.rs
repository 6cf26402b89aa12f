use async_trait::async_trait;
use mailring_common::{Batch, BatchLimit};
use serde::Deserialize;

use crate::{
    Adapter, AdapterError, Code, ConfigError, ProviderSettings, Response,
    mailgun::{Mailgun, MailgunConfig, MailgunForm},
    mandrill::{Mandrill, MandrillConfig, MandrillSend},
    sendgrid::{Sendgrid, SendgridConfig, SendgridMail},
    ses::{Ses, SesConfig, SesRequest},
};

/// Which service a provider talks to, and its credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum TransportConfig {
    Sendgrid(SendgridConfig),
    Mailgun(MailgunConfig),
    Mandrill(MandrillConfig),
    Ses(SesConfig),
}

impl TransportConfig {
    /// Success codes, failure codes and declared batch limit used when the
    /// provider does not override them
    #[must_use]
    pub fn defaults(&self) -> (Vec<Code>, Vec<Code>, i64) {
        match self {
            Self::Sendgrid(_) => {
                let (success, failure) = SendgridConfig::codes();
                (success, failure, SendgridConfig::BATCH_LIMIT)
            }
            Self::Mailgun(_) => {
                let (success, failure) = MailgunConfig::codes();
                (success, failure, MailgunConfig::BATCH_LIMIT)
            }
            Self::Mandrill(_) => {
                let (success, failure) = MandrillConfig::codes();
                (success, failure, MandrillConfig::BATCH_LIMIT)
            }
            Self::Ses(_) => {
                let (success, failure) = SesConfig::codes();
                (success, failure, SesConfig::BATCH_LIMIT)
            }
        }
    }

    /// Build the adapter
    ///
    /// # Errors
    /// If credentials or addresses in the configuration are unusable
    pub fn into_transport(
        self,
        client: reqwest::Client,
        sandbox: bool,
    ) -> Result<Transport, ConfigError> {
        Ok(match self {
            Self::Sendgrid(config) => Transport::Sendgrid(Sendgrid::new(client, config, sandbox)?),
            Self::Mailgun(config) => Transport::Mailgun(Mailgun::new(client, config, sandbox)?),
            Self::Mandrill(config) => Transport::Mandrill(Mandrill::new(client, config)?),
            Self::Ses(config) => Transport::Ses(Box::new(Ses::new(client, config)?)),
        })
    }
}

/// One configured provider
///
/// ```ron
/// (
///     name: "primary",
///     transport: Sendgrid(api_key: "SG.xxx"),
///     sandbox: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub transport: TransportConfig,
    /// Replaces the transport's default success codes
    #[serde(default)]
    pub success_codes: Option<Vec<Code>>,
    /// Replaces the transport's default failure codes
    #[serde(default)]
    pub failure_codes: Option<Vec<Code>>,
    /// -1 or 0 for unbounded, otherwise at most 1000
    #[serde(default)]
    pub batch_limit: Option<i64>,
    #[serde(default)]
    pub sandbox: bool,
}

impl ProviderConfig {
    /// Resolve defaults and build the settings and adapter for this provider
    ///
    /// # Errors
    /// If the settings are invalid or the adapter cannot be built
    pub fn build(
        self,
        client: reqwest::Client,
    ) -> Result<(ProviderSettings, Transport), ConfigError> {
        let (success, failure, limit) = self.transport.defaults();
        let limit = self.batch_limit.unwrap_or(limit);

        let batch_limit =
            BatchLimit::from_declared(limit).ok_or_else(|| ConfigError::InvalidBatchLimit {
                provider: self.name.clone(),
                limit,
            })?;

        let settings = ProviderSettings {
            name: self.name,
            success_codes: self.success_codes.unwrap_or(success),
            failure_codes: self.failure_codes.unwrap_or(failure),
            batch_limit,
            sandbox: self.sandbox,
        };
        settings.validate()?;

        let transport = self.transport.into_transport(client, settings.sandbox)?;

        Ok((settings, transport))
    }
}

/// Every supported provider behind one adapter type
#[derive(Debug)]
pub enum Transport {
    Sendgrid(Sendgrid),
    Mailgun(Mailgun),
    Mandrill(Mandrill),
    Ses(Box<Ses>),
}

#[derive(Debug)]
pub enum TransportPayload {
    Sendgrid(SendgridMail),
    Mailgun(MailgunForm),
    Mandrill(MandrillSend),
    Ses(SesRequest),
}

impl Transport {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sendgrid(_) => "sendgrid",
            Self::Mailgun(_) => "mailgun",
            Self::Mandrill(_) => "mandrill",
            Self::Ses(_) => "ses",
        }
    }
}

#[async_trait]
impl Adapter for Transport {
    type Payload = TransportPayload;

    fn single_recipient(&self) -> bool {
        match self {
            Self::Sendgrid(adapter) => adapter.single_recipient(),
            Self::Mailgun(adapter) => adapter.single_recipient(),
            Self::Mandrill(adapter) => adapter.single_recipient(),
            Self::Ses(adapter) => adapter.single_recipient(),
        }
    }

    fn format_content(&self, batch: Batch) -> Batch {
        match self {
            Self::Sendgrid(adapter) => adapter.format_content(batch),
            Self::Mailgun(adapter) => adapter.format_content(batch),
            Self::Mandrill(adapter) => adapter.format_content(batch),
            Self::Ses(adapter) => adapter.format_content(batch),
        }
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<TransportPayload, AdapterError> {
        Ok(match self {
            Self::Sendgrid(adapter) => {
                TransportPayload::Sendgrid(adapter.build_request_body(batch).await?)
            }
            Self::Mailgun(adapter) => {
                TransportPayload::Mailgun(adapter.build_request_body(batch).await?)
            }
            Self::Mandrill(adapter) => {
                TransportPayload::Mandrill(adapter.build_request_body(batch).await?)
            }
            Self::Ses(adapter) => TransportPayload::Ses(adapter.build_request_body(batch).await?),
        })
    }

    async fn do_send(&self, payload: TransportPayload) -> Response {
        match (self, payload) {
            (Self::Sendgrid(adapter), TransportPayload::Sendgrid(payload)) => {
                adapter.do_send(payload).await
            }
            (Self::Mailgun(adapter), TransportPayload::Mailgun(payload)) => {
                adapter.do_send(payload).await
            }
            (Self::Mandrill(adapter), TransportPayload::Mandrill(payload)) => {
                adapter.do_send(payload).await
            }
            (Self::Ses(adapter), TransportPayload::Ses(payload)) => adapter.do_send(payload).await,
            (transport, _) => Response::new(Code::named(Code::TRANSPORT)).with_error(format!(
                "Payload built for another transport handed to {}",
                transport.kind()
            )),
        }
    }
}

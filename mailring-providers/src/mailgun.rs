//! Mailgun messages API.

use std::{collections::BTreeMap, sync::LazyLock};

use async_trait::async_trait;
use mailring_common::{Batch, template};
use regex::Regex;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    Adapter, AdapterError, Code, ConfigError, Response,
    http::{LoadedAttachment, into_response},
};

#[allow(clippy::expect_used, reason = "The pattern is a literal")]
static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}$")
        .expect("domain pattern compiles")
});

fn default_endpoint() -> String {
    "https://api.mailgun.net".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailgunConfig {
    pub api_key: String,
    /// Sending domain registered with Mailgun
    pub domain: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl MailgunConfig {
    pub const SUCCESS: [u16; 1] = [200];
    pub const FAILURE: [u16; 8] = [400, 401, 402, 404, 500, 502, 503, 504];
    pub const BATCH_LIMIT: i64 = 1000;

    #[must_use]
    pub fn new(api_key: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            domain: domain.into(),
            endpoint: default_endpoint(),
        }
    }

    /// Default success and failure codes
    #[must_use]
    pub fn codes() -> (Vec<Code>, Vec<Code>) {
        (
            Self::SUCCESS.into_iter().map(Code::from).collect(),
            Self::FAILURE
                .into_iter()
                .map(Code::from)
                .chain([Code::CONNECT.into(), Code::TIMEOUT.into()])
                .collect(),
        )
    }
}

#[must_use]
pub fn is_valid_domain(domain: &str) -> bool {
    !domain.trim().is_empty() && DOMAIN.is_match(domain)
}

/// Form fields and files for `POST /v3/<domain>/messages`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailgunForm {
    pub fields: Vec<(&'static str, String)>,
    pub attachments: Vec<LoadedAttachment>,
}

impl MailgunForm {
    /// First value of a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }

    fn into_form(self) -> Form {
        let form = self
            .fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));

        self.attachments.into_iter().fold(form, |form, attachment| {
            let field = if attachment.inline {
                "inline"
            } else {
                "attachment"
            };

            let part = Part::bytes(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.content_type)
                .unwrap_or_else(|_| {
                    Part::bytes(attachment.content).file_name(attachment.filename)
                });

            form.part(field, part)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Mailgun {
    client: reqwest::Client,
    config: MailgunConfig,
    sandbox: bool,
}

impl Mailgun {
    /// # Errors
    /// If the api key is blank or the domain is malformed
    pub fn new(
        client: reqwest::Client,
        config: MailgunConfig,
        sandbox: bool,
    ) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                provider: "mailgun".to_string(),
                field: "api_key",
            });
        }

        if !is_valid_domain(&config.domain) {
            return Err(ConfigError::InvalidDomain(config.domain));
        }

        Ok(Self {
            client,
            config,
            sandbox,
        })
    }
}

#[async_trait]
impl Adapter for Mailgun {
    type Payload = MailgunForm;

    fn format_content(&self, mut batch: Batch) -> Batch {
        batch
            .message
            .body
            .map_parts(|part| template::rewrite(part, "%recipient.", "%"));
        batch
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<MailgunForm, AdapterError> {
        let message = &batch.message;

        let variables = message
            .receivers
            .iter()
            .map(|receiver| (receiver.email.as_str(), receiver.personalisation()))
            .collect::<BTreeMap<_, _>>();

        let mut fields = vec![
            ("from", message.sender.to_string()),
            (
                "to",
                message
                    .receivers
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ("subject", message.subject.clone()),
            ("h:Reply-To", message.reply_to().to_string()),
            ("recipient-variables", serde_json::to_string(&variables)?),
        ];

        if let Some(cc) = &message.cc {
            fields.push(("cc", cc.to_string()));
        }
        if let Some(bcc) = &message.bcc {
            fields.push(("bcc", bcc.to_string()));
        }
        if let Some(text) = &message.body.text {
            fields.push(("text", text.clone()));
        }
        if let Some(html) = &message.body.html {
            fields.push(("html", html.clone()));
        }
        if self.sandbox {
            fields.push(("o:testmode", "yes".to_string()));
        }

        Ok(MailgunForm {
            fields,
            attachments: LoadedAttachment::load_all(&message.attachments).await?,
        })
    }

    async fn do_send(&self, payload: MailgunForm) -> Response {
        let result = self
            .client
            .post(format!(
                "{}/v3/{}/messages",
                self.config.endpoint, self.config.domain
            ))
            .basic_auth("api", Some(&self.config.api_key))
            .multipart(payload.into_form())
            .send()
            .await;

        into_response(result).await
    }
}

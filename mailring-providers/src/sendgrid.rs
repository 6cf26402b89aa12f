//! SendGrid v3 mail send API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mailring_common::{Address, Batch, template};
use serde::{Deserialize, Serialize};

use crate::{
    Adapter, AdapterError, Code, ConfigError, Response,
    http::{LoadedAttachment, into_response},
};

fn default_endpoint() -> String {
    "https://api.sendgrid.com".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendgridConfig {
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl SendgridConfig {
    pub const SUCCESS: [u16; 2] = [200, 202];
    pub const FAILURE: [u16; 1] = [500];
    pub const BATCH_LIMIT: i64 = 1000;

    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Address> for Mailbox {
    fn from(address: &Address) -> Self {
        Self {
            email: address.email.clone(),
            name: address.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Personalization {
    pub to: Vec<Mailbox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Mailbox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Mailbox>,
    pub subject: String,
    pub substitutions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub enable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailSettings {
    pub bypass_list_management: Setting,
    pub sandbox_mode: Setting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendgridAttachment {
    pub content: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub disposition: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Body of `POST /v3/mail/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendgridMail {
    pub personalizations: Vec<Personalization>,
    pub from: Mailbox,
    pub reply_to: Mailbox,
    pub subject: String,
    pub content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SendgridAttachment>,
    pub mail_settings: MailSettings,
}

#[derive(Debug, Clone)]
pub struct Sendgrid {
    client: reqwest::Client,
    config: SendgridConfig,
    sandbox: bool,
}

impl Sendgrid {
    /// # Errors
    /// If the api key is blank
    pub fn new(
        client: reqwest::Client,
        config: SendgridConfig,
        sandbox: bool,
    ) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                provider: "sendgrid".to_string(),
                field: "api_key",
            });
        }

        Ok(Self {
            client,
            config,
            sandbox,
        })
    }
}

/// `-key-` is how SendGrid substitutions are written in the body
fn substitution(key: &str) -> String {
    format!("-{key}-")
}

#[async_trait]
impl Adapter for Sendgrid {
    type Payload = SendgridMail;

    fn format_content(&self, mut batch: Batch) -> Batch {
        batch
            .message
            .body
            .map_parts(|part| template::rewrite(part, "-", "-"));
        batch
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<SendgridMail, AdapterError> {
        let message = &batch.message;

        let personalizations = message
            .receivers
            .iter()
            .map(|receiver| Personalization {
                to: vec![Mailbox::from(&receiver.address)],
                cc: message.cc.iter().map(Mailbox::from).collect(),
                bcc: message.bcc.iter().map(Mailbox::from).collect(),
                subject: message.subject.clone(),
                substitutions: receiver
                    .personalisation()
                    .into_iter()
                    .map(|(key, value)| (substitution(&key), value))
                    .collect(),
            })
            .collect();

        let content = [
            ("text/plain", &message.body.text),
            ("text/html", &message.body.html),
        ]
        .into_iter()
        .filter_map(|(kind, part)| {
            part.as_ref().map(|value| Content {
                kind,
                value: value.clone(),
            })
        })
        .collect();

        let attachments = LoadedAttachment::load_all(&message.attachments)
            .await?
            .into_iter()
            .map(|attachment| SendgridAttachment {
                content: attachment.base64(),
                disposition: if attachment.inline {
                    "inline"
                } else {
                    "attachment"
                },
                content_id: attachment.inline.then(|| attachment.filename.clone()),
                kind: attachment.content_type,
                filename: attachment.filename,
            })
            .collect();

        Ok(SendgridMail {
            personalizations,
            from: Mailbox::from(&message.sender),
            reply_to: Mailbox::from(message.reply_to()),
            subject: message.subject.clone(),
            content,
            attachments,
            mail_settings: MailSettings {
                bypass_list_management: Setting { enable: true },
                sandbox_mode: Setting {
                    enable: self.sandbox,
                },
            },
        })
    }

    async fn do_send(&self, payload: SendgridMail) -> Response {
        let result = self
            .client
            .post(format!("{}/v3/mail/send", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await;

        into_response(result).await
    }
}

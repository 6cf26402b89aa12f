//! Mandrill (Mailchimp Transactional) messages API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mailring_common::Batch;
use serde::{Deserialize, Serialize};

use crate::{
    Adapter, AdapterError, Code, ConfigError, Response, http::LoadedAttachment,
};

/// Per-recipient statuses that mean the message was accepted
const ACCEPTED: [&str; 3] = ["sent", "queued", "scheduled"];

fn default_endpoint() -> String {
    "https://mandrillapp.com/api/1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MandrillConfig {
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl MandrillConfig {
    pub const SUCCESS: [&'static str; 1] = ["sent"];
    pub const FAILURE: [&'static str; 3] = ["Invalid_Key", "PaymentRequired", "GeneralError"];
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
                .chain([Code::CONNECT, Code::TIMEOUT])
                .map(Code::from)
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct To {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Var {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeVars {
    pub rcpt: String,
    pub vars: Vec<Var>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MandrillAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MandrillMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub subject: String,
    pub from_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    pub to: Vec<To>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc_address: Option<String>,
    pub headers: BTreeMap<&'static str, String>,
    pub preserve_recipients: bool,
    pub merge: bool,
    pub merge_language: &'static str,
    pub merge_vars: Vec<MergeVars>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MandrillAttachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<MandrillAttachment>,
}

/// Body of `POST /messages/send.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MandrillSend {
    pub key: String,
    pub message: MandrillMessage,
}

/// One entry of a successful send's answer
#[derive(Debug, Clone, Deserialize, Serialize)]
struct RecipientStatus {
    email: String,
    status: String,
    #[serde(default)]
    reject_reason: Option<String>,
}

/// Answer to a failed call
#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    name: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct Mandrill {
    client: reqwest::Client,
    config: MandrillConfig,
}

impl Mandrill {
    /// # Errors
    /// If the api key is blank
    pub fn new(client: reqwest::Client, config: MandrillConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                provider: "mandrill".to_string(),
                field: "api_key",
            });
        }

        Ok(Self { client, config })
    }

    /// Collapse the per-recipient answer of a successful call
    fn accepted(body: &str) -> Response {
        let statuses = match serde_json::from_str::<Vec<RecipientStatus>>(body) {
            Ok(statuses) => statuses,
            Err(err) => {
                return Response::new(Code::named("sent"))
                    .with_error(format!("Unreadable send result: {err}"));
            }
        };

        let rejected = statuses
            .into_iter()
            .filter(|status| !ACCEPTED.contains(&status.status.as_str()))
            .collect::<Vec<_>>();

        let response = Response::new(Code::named("sent"));
        if rejected.is_empty() {
            response
        } else {
            response.with_error(
                serde_json::to_string(&rejected)
                    .unwrap_or_else(|_| format!("{} recipients not sent", rejected.len())),
            )
        }
    }

    fn rejected(status: u16, body: String) -> Response {
        match serde_json::from_str::<ApiError>(&body) {
            Ok(error) => Response::new(Code::Named(error.name)).with_error(error.message),
            Err(_) => Response::new(Code::Status(status)).with_error(body),
        }
    }
}

#[async_trait]
impl Adapter for Mandrill {
    type Payload = MandrillSend;

    async fn build_request_body(&self, batch: &Batch) -> Result<MandrillSend, AdapterError> {
        let message = &batch.message;

        let to = message
            .receivers
            .iter()
            .map(|receiver| To {
                email: receiver.email.clone(),
                name: receiver.name.clone(),
                kind: "to",
            })
            .chain(message.cc.iter().map(|cc| To {
                email: cc.email.clone(),
                name: cc.name.clone(),
                kind: "cc",
            }))
            .collect();

        let merge_vars = message
            .receivers
            .iter()
            .map(|receiver| MergeVars {
                rcpt: receiver.email.clone(),
                vars: receiver
                    .personalisation()
                    .into_iter()
                    .map(|(name, content)| Var { name, content })
                    .collect(),
            })
            .collect();

        let (images, attachments): (Vec<_>, Vec<_>) =
            LoadedAttachment::load_all(&message.attachments)
                .await?
                .into_iter()
                .partition(|attachment| attachment.inline);
        let encode = |attachment: LoadedAttachment| MandrillAttachment {
            content: attachment.base64(),
            kind: attachment.content_type,
            name: attachment.filename,
        };

        Ok(MandrillSend {
            key: self.config.api_key.clone(),
            message: MandrillMessage {
                html: message.body.html.clone(),
                text: message.body.text.clone(),
                subject: message.subject.clone(),
                from_email: message.sender.email.clone(),
                from_name: message.sender.name.clone(),
                to,
                bcc_address: message.bcc.as_ref().map(|bcc| bcc.email.clone()),
                headers: BTreeMap::from([("Reply-To", message.reply_to().email.clone())]),
                preserve_recipients: false,
                merge: true,
                merge_language: "handlebars",
                merge_vars,
                attachments: attachments.into_iter().map(encode).collect(),
                images: images.into_iter().map(encode).collect(),
            },
        })
    }

    async fn do_send(&self, payload: MandrillSend) -> Response {
        let result = self
            .client
            .post(format!("{}/messages/send.json", self.config.endpoint))
            .json(&payload)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => return Response::from_transport(&err),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return Response::from_transport(&err),
        };

        if status.is_success() {
            Self::accepted(&body)
        } else {
            Self::rejected(status.as_u16(), body)
        }
    }
}

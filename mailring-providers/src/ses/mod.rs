//! Amazon SES v2 `SendEmail`, one recipient per call.

pub mod sigv4;

use async_trait::async_trait;
use mailring_common::{Batch, template, tracing};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use self::sigv4::Signer;
use crate::{
    Adapter, AdapterError, Code, ConfigError, Response, http::into_response, rate::SendRate,
};

const PATH: &str = "/v2/email/outbound-emails";

const fn default_send_rate() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SesConfig {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    /// Overrides `https://email.<region>.amazonaws.com`
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Messages per second
    #[serde(default = "default_send_rate")]
    pub send_rate: u32,
}

impl SesConfig {
    pub const SUCCESS: [u16; 1] = [200];
    pub const FAILURE: [u16; 1] = [500];
    pub const BATCH_LIMIT: i64 = -1;

    #[must_use]
    pub fn new(
        access_key: impl Into<String>,
        secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret: secret.into(),
            region: region.into(),
            endpoint: None,
            send_rate: default_send_rate(),
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

    fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://email.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Data {
    pub data: String,
    pub charset: &'static str,
}

impl Data {
    fn utf8(data: String) -> Self {
        Self {
            data,
            charset: "UTF-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Destination {
    pub to_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc_addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Body {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Data>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<Data>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Simple {
    pub subject: Data,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Content {
    pub simple: Simple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendEmail {
    pub from_email_address: String,
    pub destination: Destination,
    pub reply_to_addresses: Vec<String>,
    pub content: Content,
}

/// A personalised email and its encoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SesRequest {
    pub email: SendEmail,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub struct Ses {
    client: reqwest::Client,
    signer: Signer,
    endpoint: Url,
    host: String,
    rate: SendRate,
}

impl Ses {
    /// # Errors
    /// If a credential is blank, the endpoint is not a url, or the send rate is zero
    pub fn new(client: reqwest::Client, config: SesConfig) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("access_key", &config.access_key),
            ("secret", &config.secret),
            ("region", &config.region),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingCredential {
                    provider: "ses".to_string(),
                    field,
                });
            }
        }

        if config.send_rate == 0 {
            return Err(ConfigError::InvalidSendRate(config.send_rate));
        }

        let endpoint = config.endpoint();
        let url = Url::parse(&endpoint)
            .and_then(|url| url.join(PATH))
            .map_err(|_| ConfigError::InvalidEndpoint(endpoint.clone()))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ConfigError::InvalidEndpoint(endpoint)),
        };

        Ok(Self {
            client,
            signer: Signer {
                access_key: config.access_key,
                secret: config.secret,
                region: config.region,
                service: "ses",
            },
            endpoint: url,
            host,
            rate: SendRate::new(config.send_rate),
        })
    }
}

#[async_trait]
impl Adapter for Ses {
    type Payload = SesRequest;

    fn single_recipient(&self) -> bool {
        true
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<SesRequest, AdapterError> {
        let message = &batch.message;
        let [receiver] = message.receivers.as_slice() else {
            return Err(AdapterError::Unsupported {
                provider: "ses",
                reason: format!("{} recipients in one call", message.receivers.len()),
            });
        };

        if !message.attachments.is_empty() {
            tracing::warn!(
                batch = %batch.id,
                attachments = message.attachments.len(),
                "SES simple content carries no attachments, sending without them"
            );
        }

        let variables = receiver.personalisation();
        let render = |part: &Option<String>| {
            part.as_deref()
                .map(|part| Data::utf8(template::render(part, &variables)))
        };

        let email = SendEmail {
            from_email_address: message.sender.to_string(),
            destination: Destination {
                to_addresses: vec![receiver.to_string()],
                cc_addresses: message.cc.iter().map(ToString::to_string).collect(),
                bcc_addresses: message.bcc.iter().map(ToString::to_string).collect(),
            },
            reply_to_addresses: vec![message.reply_to().to_string()],
            content: Content {
                simple: Simple {
                    subject: Data::utf8(template::render(&message.subject, &variables)),
                    body: Body {
                        text: render(&message.body.text),
                        html: render(&message.body.html),
                    },
                },
            },
        };

        let body = serde_json::to_vec(&email)?;
        Ok(SesRequest { email, body })
    }

    async fn do_send(&self, payload: SesRequest) -> Response {
        self.rate.acquire().await;

        let now = chrono::Utc::now();
        let date = sigv4::amz_date(now);
        let request = sigv4::Request {
            method: "POST",
            path: self.endpoint.path(),
            query: "",
            headers: vec![
                ("content-type", "application/json".to_string()),
                ("host", self.host.clone()),
                ("x-amz-date", date.clone()),
            ],
            payload: &payload.body,
        };

        let authorization = match self.signer.authorization(&request, now) {
            Ok(authorization) => authorization,
            Err(err) => return Response::new(Code::named(Code::TRANSPORT)).with_error(err.to_string()),
        };

        let result = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-amz-date", date)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(payload.body)
            .send()
            .await;

        into_response(result).await
    }
}

//! Plumbing shared by the HTTP adapters.

use std::time::Duration;

use base64::Engine as _;
use mailring_common::Attachment;
use serde::Deserialize;

use crate::{AdapterError, Code, ConfigError, Response};

const fn default_timeout() -> u64 {
    30
}

/// HTTP client settings shared by every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Seconds before a provider call is abandoned with a `timeout` code
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

impl HttpConfig {
    /// Build a client honouring these settings
    ///
    /// # Errors
    /// If the TLS backend cannot be initialised
    pub fn client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .user_agent(concat!("mailring/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))
    }
}

/// An attachment read into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAttachment {
    pub filename: String,
    pub content_type: String,
    pub inline: bool,
    pub content: Vec<u8>,
}

impl LoadedAttachment {
    /// Read an attachment from disk
    ///
    /// # Errors
    /// If the file has gone away or cannot be read
    pub async fn load(attachment: &Attachment) -> Result<Self, AdapterError> {
        let content = tokio::fs::read(&attachment.filepath).await.map_err(|source| {
            AdapterError::Attachment {
                filename: attachment.filename.clone(),
                path: attachment.filepath.clone(),
                source,
            }
        })?;

        Ok(Self {
            filename: attachment.filename.clone(),
            content_type: mime_guess::from_path(&attachment.filename)
                .first_or_octet_stream()
                .to_string(),
            inline: attachment.disposition == mailring_common::Disposition::Inline,
            content,
        })
    }

    /// Read every attachment, in order
    ///
    /// # Errors
    /// On the first attachment that cannot be read
    pub async fn load_all(attachments: &[Attachment]) -> Result<Vec<Self>, AdapterError> {
        let mut loaded = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            loaded.push(Self::load(attachment).await?);
        }
        Ok(loaded)
    }

    #[must_use]
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.content)
    }
}

/// Turn the outcome of a request into a response
///
/// The body of an unsuccessful answer is kept as the error detail.
pub async fn into_response(result: reqwest::Result<reqwest::Response>) -> Response {
    match result {
        Ok(response) => {
            let status = response.status();
            let code = Code::Status(status.as_u16());

            if status.is_success() {
                return Response::new(code);
            }

            match response.text().await {
                Ok(body) if !body.trim().is_empty() => Response::new(code).with_error(body),
                _ => Response::new(code).with_error(status.to_string()),
            }
        }
        Err(err) => Response::from_transport(&err),
    }
}

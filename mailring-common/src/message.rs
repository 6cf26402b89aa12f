use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::address::{Address, Recipient};

/// Text and/or HTML content of a message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl Body {
    /// Apply `f` to every present part of the body
    pub fn map_parts(&mut self, f: impl Fn(&str) -> String) {
        if let Some(text) = self.text.as_mut() {
            *text = f(text);
        }
        if let Some(html) = self.html.as_mut() {
            *html = f(html);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Attachment,
    Inline,
}

impl Disposition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

/// A file attached to a message, read from `filepath` at send time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub filepath: PathBuf,
    #[serde(default)]
    pub disposition: Disposition,
}

impl Attachment {
    #[must_use]
    pub fn new(filename: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            filepath: filepath.into(),
            disposition: Disposition::default(),
        }
    }

    #[must_use]
    pub const fn inline(mut self) -> Self {
        self.disposition = Disposition::Inline;
        self
    }
}

/// A message as submitted for delivery
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Address,
    pub receivers: Vec<Recipient>,
    #[serde(default)]
    pub cc: Option<Address>,
    #[serde(default)]
    pub bcc: Option<Address>,
    #[serde(default)]
    pub reply_to: Option<Address>,
    pub subject: String,
    pub body: Body,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Fill in defaults that are implied by the rest of the message.
    ///
    /// Currently this means `reply_to` falls back to the sender.
    #[must_use]
    pub fn normalised(mut self) -> Self {
        if self.reply_to.is_none() {
            self.reply_to = Some(self.sender.clone());
        }
        self
    }

    /// The reply-to address, falling back to the sender
    #[must_use]
    pub fn reply_to(&self) -> &Address {
        self.reply_to.as_ref().unwrap_or(&self.sender)
    }
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    #[must_use]
    pub fn sender(mut self, sender: Address) -> Self {
        self.message.sender = sender;
        self
    }

    #[must_use]
    pub fn receiver(mut self, receiver: impl Into<Recipient>) -> Self {
        self.message.receivers.push(receiver.into());
        self
    }

    #[must_use]
    pub fn receivers(mut self, receivers: impl IntoIterator<Item = Recipient>) -> Self {
        self.message.receivers.extend(receivers);
        self
    }

    #[must_use]
    pub fn cc(mut self, cc: Address) -> Self {
        self.message.cc = Some(cc);
        self
    }

    #[must_use]
    pub fn bcc(mut self, bcc: Address) -> Self {
        self.message.bcc = Some(bcc);
        self
    }

    #[must_use]
    pub fn reply_to(mut self, reply_to: Address) -> Self {
        self.message.reply_to = Some(reply_to);
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = subject.into();
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.message.body.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.message.body.html = Some(html.into());
        self
    }

    #[must_use]
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.message.attachments.push(attachment);
        self
    }

    /// Finish building. The message is not validated until it is submitted.
    #[must_use]
    pub fn build(self) -> Message {
        self.message
    }
}

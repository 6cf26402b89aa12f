use std::fs::File;

use crate::{
    address::{Address, Recipient},
    error::ValidationError,
    message::{Attachment, Body, Message},
};

impl Message {
    /// Check the message before it is accepted for delivery.
    ///
    /// Checks run in a fixed order and the first violation is returned:
    /// subject, sender, receivers (addresses then variables), cc, bcc,
    /// reply-to, attachments, body.
    ///
    /// Attachments are checked with blocking filesystem calls. Async callers
    /// with attachments should run this on the blocking pool.
    ///
    /// # Errors
    /// The [`ValidationError`] describing the first rule the message breaks
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }

        if !self.sender.is_valid() {
            return Err(ValidationError::InvalidSender(self.sender.email.clone()));
        }

        validate_receivers(&self.receivers)?;

        optional(self.cc.as_ref(), ValidationError::InvalidCc)?;
        optional(self.bcc.as_ref(), ValidationError::InvalidBcc)?;
        optional(self.reply_to.as_ref(), ValidationError::InvalidReplyTo)?;

        self.attachments.iter().try_for_each(validate_attachment)?;

        validate_body(&self.body)
    }
}

fn optional(
    address: Option<&Address>,
    err: impl FnOnce(String) -> ValidationError,
) -> Result<(), ValidationError> {
    match address {
        Some(address) if !address.is_valid() => Err(err(address.email.clone())),
        _ => Ok(()),
    }
}

fn validate_receivers(receivers: &[Recipient]) -> Result<(), ValidationError> {
    if receivers.is_empty() {
        return Err(ValidationError::NoReceivers);
    }

    for (index, receiver) in receivers.iter().enumerate() {
        if !receiver.is_valid() {
            return Err(ValidationError::InvalidReceiver {
                index,
                email: receiver.email.clone(),
            });
        }

        if let Some(key) = receiver.variables.keys().find(|key| !is_variable_key(key)) {
            return Err(ValidationError::InvalidVariable {
                email: receiver.email.clone(),
                key: key.clone(),
            });
        }
    }

    Ok(())
}

fn is_variable_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| c.is_whitespace() || c == '{' || c == '}')
}

fn validate_attachment(attachment: &Attachment) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidAttachment {
        filename: attachment.filename.clone(),
        reason,
    };

    if attachment.filename.trim().is_empty() {
        return Err(invalid("filename is empty".to_string()));
    }

    if attachment.filepath.as_os_str().is_empty() {
        return Err(invalid("filepath is empty".to_string()));
    }

    if !attachment.filepath.is_file() {
        return Err(invalid(format!(
            "{} is not an existing file",
            attachment.filepath.display()
        )));
    }

    File::open(&attachment.filepath)
        .map(drop)
        .map_err(|e| invalid(format!("{} is not readable: {e}", attachment.filepath.display())))
}

fn validate_body(body: &Body) -> Result<(), ValidationError> {
    if body.text.is_none() && body.html.is_none() {
        return Err(ValidationError::InvalidBody("neither text nor html supplied"));
    }

    if body.text.as_deref().is_some_and(|text| text.trim().is_empty()) {
        return Err(ValidationError::InvalidBody("text is blank"));
    }

    if body.html.as_deref().is_some_and(|html| html.trim().is_empty()) {
        return Err(ValidationError::InvalidBody("html is blank"));
    }

    Ok(())
}

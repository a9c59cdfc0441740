//! Jobs and the messages composed from them.

use serde::{Deserialize, Serialize};

use crate::core::ValidationError;

/// Plain-text part used when a job carries only HTML content.
pub const DEFAULT_FALLBACK_TEXT: &str = "This message is best viewed in an HTML capable client.";

/// One outbound message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    recipient: String,
    subject: String,
    body: String,
}

impl Job {
    /// Build a job, validating the recipient's address shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRecipient`] when the recipient does not
    /// look like `local@domain.tld`.
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let recipient = recipient.into().trim().to_owned();
        if !is_valid_address(&recipient) {
            return Err(ValidationError::InvalidRecipient(recipient));
        }
        Ok(Self {
            recipient,
            subject: subject.into(),
            body: body.into(),
        })
    }

    /// Recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Rendered HTML body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Compose a multipart/alternative message with a plain-text fallback.
    #[must_use]
    pub fn compose(&self, fallback_text: &str) -> ComposedMessage {
        ComposedMessage {
            to: self.recipient.clone(),
            subject: self.subject.clone(),
            text_body: fallback_text.to_owned(),
            html_body: self.body.clone(),
        }
    }
}

/// Message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text alternative.
    pub text_body: String,
    /// HTML alternative.
    pub html_body: String,
}

/// Address-shape check: exactly one `@`, a non-empty local part, and a domain
/// with at least one `.` separating non-empty labels. No whitespace.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = address.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

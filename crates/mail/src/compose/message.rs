//! Outbound message model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::encoding::{decode_base64, encode_url_safe};
use super::mime::ContentType;
use crate::error::{MailError, Result};
use crate::models::{EmailAddress, require_addresses};

/// A file ready to be embedded in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name presented to the recipient
    pub filename: String,
    /// Inferred (or declared) MIME type
    pub content_type: ContentType,
    /// Raw bytes
    pub data: Vec<u8>,
    /// Where the bytes were loaded from, if from disk
    pub source: Option<PathBuf>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: ContentType, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
            source: None,
        }
    }

    /// `main/sub` without parameters
    pub fn mime_type(&self) -> String {
        self.content_type.mime_type()
    }
}

/// Address header input: either already-parsed addresses or raw header text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    Parsed(Vec<EmailAddress>),
    Raw(String),
}

impl AddressInput {
    fn resolve(self, header: &str) -> Result<Vec<EmailAddress>> {
        match self {
            AddressInput::Parsed(list) if list.iter().any(|a| a.email.trim().is_empty()) => Err(
                MailError::Composition(format!("{header} contains an empty address")),
            ),
            AddressInput::Parsed(list) if list.is_empty() => {
                Err(MailError::Composition(format!("missing {header} header")))
            }
            AddressInput::Parsed(list) => Ok(list),
            AddressInput::Raw(raw) => require_addresses(&raw).map_err(|_| {
                MailError::Composition(format!("no valid address in {header} header: {raw:?}"))
            }),
        }
    }
}

impl From<&str> for AddressInput {
    fn from(s: &str) -> Self {
        AddressInput::Raw(s.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(s: String) -> Self {
        AddressInput::Raw(s)
    }
}

impl From<EmailAddress> for AddressInput {
    fn from(addr: EmailAddress) -> Self {
        AddressInput::Parsed(vec![addr])
    }
}

impl From<Vec<EmailAddress>> for AddressInput {
    fn from(list: Vec<EmailAddress>) -> Self {
        AddressInput::Parsed(list)
    }
}

/// A message about to be encoded
///
/// Construct through [`OutboundMessage::builder`], which guarantees the
/// required headers and the body are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: Vec<EmailAddress>,
    pub from: EmailAddress,
    pub subject: String,
    pub body_text: String,
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn builder() -> OutboundMessageBuilder {
        OutboundMessageBuilder::default()
    }
}

/// Builder for [`OutboundMessage`]
#[derive(Debug, Default)]
pub struct OutboundMessageBuilder {
    to: Option<AddressInput>,
    from: Option<AddressInput>,
    subject: String,
    body_text: Option<String>,
    attachments: Vec<Attachment>,
}

impl OutboundMessageBuilder {
    pub fn to(mut self, to: impl Into<AddressInput>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn from(mut self, from: impl Into<AddressInput>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body_text(mut self, body: impl Into<String>) -> Self {
        self.body_text = Some(body.into());
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn attachments(mut self, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Validate and build.
    ///
    /// Fails with [`MailError::Composition`] when To, From or the body is
    /// missing, when an address header has no usable address, or when an
    /// attachment has no filename.
    pub fn build(self) -> Result<OutboundMessage> {
        let to = self
            .to
            .ok_or_else(|| MailError::Composition("missing To header".to_string()))?
            .resolve("To")?;

        let mut from = self
            .from
            .ok_or_else(|| MailError::Composition("missing From header".to_string()))?
            .resolve("From")?;
        if from.len() > 1 {
            log::debug!("From header has {} addresses, using the first", from.len());
        }
        let from = from.swap_remove(0);

        let body_text = self
            .body_text
            .ok_or_else(|| MailError::Composition("missing body".to_string()))?;

        if let Some(unnamed) = self.attachments.iter().find(|a| a.filename.trim().is_empty()) {
            return Err(MailError::Composition(format!(
                "attachment of type {} has no filename",
                unnamed.mime_type()
            )));
        }

        Ok(OutboundMessage {
            to,
            from,
            subject: self.subject,
            body_text,
            attachments: self.attachments,
        })
    }
}

/// The transport-ready artifact: a full MIME message wrapped in URL-safe
/// base64 (the Gmail `raw` field)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMessage {
    pub raw: String,
}

impl EncodedMessage {
    /// Wrap rendered MIME text
    pub fn from_mime(mime: &str) -> Self {
        Self {
            raw: encode_url_safe(mime.as_bytes()),
        }
    }

    /// Unwrap back to MIME bytes
    pub fn mime_bytes(&self) -> Result<Vec<u8>> {
        decode_base64(&self.raw)
            .map_err(|e| MailError::Composition(format!("raw payload is not base64: {e}")))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_parses_raw_addresses() {
        let msg = OutboundMessage::builder()
            .to("Ann <ann@example.com>, bob@example.com")
            .from("me@example.com")
            .subject("Hi")
            .body_text("Hello")
            .build()
            .unwrap();
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.from, EmailAddress::new("me@example.com"));
    }

    #[test]
    fn test_builder_requires_body() {
        let err = OutboundMessage::builder()
            .to("ann@example.com")
            .from("me@example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, MailError::Composition(ref m) if m == "missing body"));
    }

    #[test]
    fn test_builder_requires_valid_recipient() {
        let err = OutboundMessage::builder()
            .to("not-an-email")
            .from("me@example.com")
            .body_text("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, MailError::Composition(_)));

        let err = OutboundMessage::builder()
            .from("me@example.com")
            .body_text("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, MailError::Composition(ref m) if m == "missing To header"));
    }

    #[test]
    fn test_builder_rejects_unnamed_attachment() {
        let err = OutboundMessage::builder()
            .to("ann@example.com")
            .from("me@example.com")
            .body_text("x")
            .attachment(Attachment::new(" ", ContentType::octet_stream(), vec![1, 2]))
            .build()
            .unwrap_err();
        assert!(matches!(err, MailError::Composition(_)));
    }

    #[test]
    fn test_encoded_message_unwraps() {
        let encoded = EncodedMessage::from_mime("Subject: x\r\n\r\nbody");
        assert_eq!(encoded.mime_bytes().unwrap(), b"Subject: x\r\n\r\nbody");
        assert!(EncodedMessage { raw: "***".to_string() }.mime_bytes().is_err());
    }
}

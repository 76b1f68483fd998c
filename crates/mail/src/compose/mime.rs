//! MIME rendering and parsing
//!
//! [`render`] builds RFC 5322 / MIME text with `lettre` and [`encode`] wraps
//! it for transport. [`decode`] and [`parse`] go the other way through
//! `mail-parser`, which also understands the nested multiparts and
//! quoted-printable parts found in received mail.

use std::fmt;

use email_encoding::headers::{rfc2047, writer::EmailWriter};
use lettre::message::header::{
    self, ContentTransferEncoding, HeaderName, HeaderValue as LettreHeaderValue,
};
use lettre::message::{
    Attachment as AttachmentPart, Body, Mailbox, MessageBuilder, MultiPart, SinglePart,
};
use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::message::{Attachment, EncodedMessage, OutboundMessage};
use crate::error::{MailError, Result};
use crate::models::{EmailAddress, addresses_from_parsed};

/// MIME content type with ordered parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type, lowercase (e.g. "text", "image", "multipart")
    pub main_type: String,
    /// Subtype, lowercase (e.g. "plain", "jpeg", "mixed")
    pub sub_type: String,
    /// Parameters in header order; names are lowercase
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into().to_ascii_lowercase(),
            sub_type: sub_type.into().to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Set a parameter, replacing an existing one of the same name
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.parameters.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.parameters.push((name, value)),
        }
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `main/sub` without parameters
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Content type of a parsed part, minus the `name` parameter that
    /// duplicates the attachment filename
    fn from_parsed(parsed: &mail_parser::ContentType<'_>) -> Self {
        let mut content_type = Self::new(
            parsed.ctype(),
            parsed.subtype().unwrap_or("octet-stream"),
        );
        for (name, value) in parsed.attributes().unwrap_or_default() {
            if !name.eq_ignore_ascii_case("name") {
                content_type = content_type.with_parameter(name.as_ref(), value.as_ref());
            }
        }
        content_type
    }

    fn to_header(&self) -> Result<header::ContentType> {
        header::ContentType::parse(&self.to_string()).map_err(|e| {
            MailError::Composition(format!("invalid content type {}: {e}", self.mime_type()))
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (name, value) in &self.parameters {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "; {name}=\"{escaped}\"")?;
        }
        Ok(())
    }
}

/// A message read back from MIME text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    pub to: Vec<EmailAddress>,
    pub from: Vec<EmailAddress>,
    pub subject: String,
    /// First `text/plain` body, if any
    pub body_text: Option<String>,
    /// First `text/html` body, if any
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Render and wrap a message for transport
pub fn encode(message: &OutboundMessage) -> Result<EncodedMessage> {
    let mime = render(message)?;
    Ok(EncodedMessage::from_mime(&mime))
}

/// Render a message as MIME text.
///
/// Without attachments the result is a single `text/plain` part; with
/// attachments it is `multipart/mixed` with the text part first and one
/// part per attachment in order. Every body is base64 so bytes survive
/// unchanged, line endings included.
pub fn render(message: &OutboundMessage) -> Result<String> {
    if message.to.is_empty() {
        return Err(MailError::Composition("missing To header".to_string()));
    }
    if message.from.email.trim().is_empty() {
        return Err(MailError::Composition("missing From header".to_string()));
    }

    let mut builder = lettre::Message::builder().from(mailbox(&message.from)?);
    for recipient in &message.to {
        builder = builder.to(mailbox(recipient)?);
    }
    builder = with_subject(builder, &message.subject)?;

    let text = SinglePart::builder()
        .header(header::ContentType::TEXT_PLAIN)
        .body(base64_body(message.body_text.as_bytes())?);

    let built = if message.attachments.is_empty() {
        builder.singlepart(text)
    } else {
        let mut mixed = MultiPart::mixed().singlepart(text);
        for attachment in &message.attachments {
            mixed = mixed.singlepart(attachment_part(attachment)?);
        }
        builder.multipart(mixed)
    }
    .map_err(|e| MailError::Composition(format!("failed to build message: {e}")))?;

    String::from_utf8(built.formatted())
        .map_err(|e| MailError::Composition(format!("rendered message is not text: {e}")))
}

/// Unwrap a transport payload and parse it
pub fn decode(encoded: &EncodedMessage) -> Result<DecodedMessage> {
    parse(&encoded.mime_bytes()?)
}

/// Parse MIME bytes into the addresses, subject, bodies and attachments
pub fn parse(raw: &[u8]) -> Result<DecodedMessage> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::Composition("message has no headers".to_string()))?;

    let body_text = parsed.text_bodies().find_map(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });
    let body_html = parsed.html_bodies().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });

    let mut attachments = Vec::new();
    for part in parsed.attachments() {
        let Some(filename) = part.attachment_name() else {
            log::debug!("Skipping unnamed attachment part");
            continue;
        };
        let content_type = part
            .content_type()
            .map(ContentType::from_parsed)
            .unwrap_or_else(ContentType::octet_stream);
        attachments.push(Attachment::new(filename, content_type, part.contents().to_vec()));
    }

    Ok(DecodedMessage {
        to: addresses_from_parsed(parsed.to()),
        from: addresses_from_parsed(parsed.from()),
        subject: parsed.subject().unwrap_or_default().to_string(),
        body_text,
        body_html,
        attachments,
    })
}

fn mailbox(address: &EmailAddress) -> Result<Mailbox> {
    let email = address.email.parse::<lettre::Address>().map_err(|e| {
        MailError::Composition(format!("invalid address {:?}: {e}", address.email))
    })?;
    Ok(Mailbox::new(address.name.clone(), email))
}

/// Set the Subject header.
///
/// Unstructured header parsing trims surrounding whitespace, so a subject
/// with leading or trailing whitespace is written as encoded-words, which
/// keep it verbatim.
fn with_subject(builder: MessageBuilder, subject: &str) -> Result<MessageBuilder> {
    if subject.trim() == subject {
        return Ok(builder.subject(subject));
    }

    let name = HeaderName::new_from_ascii_str("Subject");
    let mut encoded = String::new();
    {
        let mut writer = EmailWriter::new(&mut encoded, "Subject: ".len(), 0, false);
        rfc2047::encode(subject, &mut writer)
            .map_err(|e| MailError::Composition(format!("failed to encode subject: {e}")))?;
    }
    Ok(builder.raw_header(LettreHeaderValue::dangerous_new_pre_encoded(
        name,
        subject.to_string(),
        encoded,
    )))
}

fn base64_body(data: &[u8]) -> Result<Body> {
    Body::new_with_encoding(data.to_vec(), ContentTransferEncoding::Base64)
        .map_err(|_| MailError::Composition("body cannot be base64 encoded".to_string()))
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart> {
    if attachment.filename.trim().is_empty() {
        return Err(MailError::Composition(format!(
            "attachment of type {} has no filename",
            attachment.mime_type()
        )));
    }
    Ok(AttachmentPart::new(attachment.filename.clone())
        .body(base64_body(&attachment.data)?, attachment.content_type.to_header()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(attachments: Vec<Attachment>) -> OutboundMessage {
        OutboundMessage::builder()
            .to("Ann <ann@example.com>")
            .from("me@example.com")
            .subject("Quarterly report")
            .body_text("Please find it attached.\nThanks")
            .attachments(attachments)
            .build()
            .unwrap()
    }

    fn with_subject_text(subject: &str) -> OutboundMessage {
        OutboundMessage::builder()
            .to("ann@example.com")
            .from("me@example.com")
            .subject(subject)
            .body_text("x")
            .build()
            .unwrap()
    }

    #[test]
    fn test_content_type_display_quotes_parameters() {
        let ct = ContentType::new("Text", "Plain").with_parameter("charset", "utf-8");
        assert_eq!(ct.mime_type(), "text/plain");
        assert_eq!(ct.parameter("CHARSET"), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/plain; charset=\"utf-8\"");
        assert!(ct.to_header().is_ok());
    }

    #[test]
    fn test_plain_message_is_single_part() {
        let mime = render(&message(vec![])).unwrap();
        assert!(mime.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(mime.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(!mime.contains("multipart"));
        assert!(mime.contains("MIME-Version: 1.0\r\n"));

        let decoded = parse(mime.as_bytes()).unwrap();
        assert_eq!(decoded.subject, "Quarterly report");
        assert_eq!(decoded.body_text.as_deref(), Some("Please find it attached.\nThanks"));
        assert_eq!(decoded.to, vec![EmailAddress::with_name("Ann", "ann@example.com")]);
        assert_eq!(decoded.from, vec![EmailAddress::new("me@example.com")]);
        assert!(decoded.attachments.is_empty());
    }

    #[test]
    fn test_attachments_keep_order_and_bytes() {
        let pdf = Attachment::new(
            "report.pdf",
            ContentType::new("application", "pdf"),
            b"%PDF-1.4 fake".to_vec(),
        );
        let png = Attachment::new(
            "chart.png",
            ContentType::new("image", "png"),
            vec![0, 159, 255, 10, 13],
        );
        let encoded = encode(&message(vec![pdf.clone(), png.clone()])).unwrap();
        let mime = String::from_utf8(encoded.mime_bytes().unwrap()).unwrap();
        assert!(mime.contains("multipart/mixed"));
        let text_at = mime.find("text/plain").unwrap();
        assert!(text_at < mime.find("report.pdf").unwrap());
        assert!(mime.find("report.pdf").unwrap() < mime.find("chart.png").unwrap());

        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.attachments.len(), 2);
        assert_eq!(decoded.attachments[0], pdf);
        assert_eq!(decoded.attachments[1], png);
        assert_eq!(decoded.body_text.as_deref(), Some("Please find it attached.\nThanks"));
    }

    #[test]
    fn test_unicode_subject_and_filename() {
        let msg = OutboundMessage::builder()
            .to("ann@example.com")
            .from("Jörg <jorg@example.de>")
            .subject("Grüße aus Köln")
            .body_text("Schöne Grüße")
            .attachment(Attachment::new(
                "überblick.txt",
                ContentType::new("text", "plain"),
                b"x".to_vec(),
            ))
            .build()
            .unwrap();
        let mime = render(&msg).unwrap();
        assert!(mime.is_ascii());
        assert!(mime.contains("filename*"));

        let decoded = parse(mime.as_bytes()).unwrap();
        assert_eq!(decoded.subject, "Grüße aus Köln");
        assert_eq!(decoded.body_text.as_deref(), Some("Schöne Grüße"));
        assert_eq!(decoded.attachments[0].filename, "überblick.txt");
        assert_eq!(decoded.from[0].name.as_deref(), Some("Jörg"));
    }

    #[test]
    fn test_subject_edge_whitespace_survives() {
        for subject in ["  Hello  ", "\tTabbed", "trailing ", "   "] {
            let decoded = decode(&encode(&with_subject_text(subject)).unwrap()).unwrap();
            assert_eq!(decoded.subject, subject);
        }
        let mime = render(&with_subject_text("  Hello  ")).unwrap();
        assert!(mime.contains("Subject: =?utf-8?b?"));
    }

    #[test]
    fn test_subject_with_newline_cannot_inject_headers() {
        let mime = render(&with_subject_text("hi\r\nBcc: victim@example.com")).unwrap();
        assert!(!mime.contains("\r\nBcc:"));
        assert_eq!(
            parse(mime.as_bytes()).unwrap().subject,
            "hi\r\nBcc: victim@example.com"
        );
    }

    #[test]
    fn test_parse_received_nested_multipart() {
        let mime = "From: a@b.com\r\n\
            To: c@d.com\r\n\
            Subject: nested\r\n\
            Content-Type: multipart/mixed; boundary=outer\r\n\
            \r\n\
            preamble\r\n\
            --outer\r\n\
            Content-Type: multipart/alternative; boundary=inner\r\n\
            \r\n\
            --inner\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            Content-Transfer-Encoding: quoted-printable\r\n\
            \r\n\
            caf=C3=A9\r\n\
            --inner\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>cafe</p>\r\n\
            --inner--\r\n\
            --outer\r\n\
            Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            AAEC\r\n\
            --outer--\r\n";
        let decoded = parse(mime.as_bytes()).unwrap();
        assert_eq!(decoded.body_text.as_deref(), Some("café"));
        assert_eq!(decoded.body_html.as_deref(), Some("<p>cafe</p>"));
        assert_eq!(decoded.attachments.len(), 1);
        assert_eq!(decoded.attachments[0].filename, "data.bin");
        assert_eq!(decoded.attachments[0].mime_type(), "application/octet-stream");
        assert_eq!(decoded.attachments[0].data, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(matches!(parse(b""), Err(MailError::Composition(_))));
    }

    #[test]
    fn test_render_rejects_empty_recipients() {
        let mut msg = message(vec![]);
        msg.to.clear();
        assert!(matches!(render(&msg), Err(MailError::Composition(_))));
    }

    #[test]
    fn test_render_rejects_unroutable_address() {
        let mut msg = message(vec![]);
        msg.to = vec![EmailAddress::new("no-at-sign")];
        assert!(matches!(render(&msg), Err(MailError::Composition(_))));
    }
}

//! Gmail API response normalization
//!
//! Reads headers, bodies, attachments and labels out of Gmail API records.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::BTreeMap;

use super::api::{ApiLabel, GmailMessage, MessagePart, MessagePayload};
use crate::compose::encoding::decode_base64;
use crate::models::{EmailAddress, Label, LabelId, Recipients, parse_address_list};

/// A part that carries a named attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    pub filename: String,
    pub mime_type: String,
    /// Set when the bytes must be fetched separately
    pub attachment_id: Option<String>,
    /// Set when the bytes are inline in the part body
    pub data: Option<String>,
}

/// Extract a header value by name
pub fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Header value on a message, if the payload was fetched
pub fn message_header(message: &GmailMessage, name: &str) -> Option<String> {
    extract_header(message.payload.as_ref()?, name)
}

/// Top-level headers as a map, optionally restricted to `names`.
///
/// Lookup is case-insensitive; keys keep the casing the server sent. The
/// first occurrence of a repeated header wins.
pub fn message_headers(message: &GmailMessage, names: Option<&[&str]>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for header in message.headers() {
        let wanted = names.is_none_or(|names| {
            names.iter().any(|n| n.eq_ignore_ascii_case(&header.name))
        });
        if wanted {
            headers
                .entry(header.name.clone())
                .or_insert_with(|| header.value.clone());
        }
    }
    headers
}

/// Extract the message body.
///
/// A payload without parts yields its own body. Otherwise the first
/// `text/html` part is used when `prefer_html` is set, then the first
/// `text/plain` part, then any part with inline data.
pub fn extract_body(payload: &MessagePayload, prefer_html: bool) -> Option<String> {
    if payload.parts().is_empty() {
        return payload.data().and_then(decode_body_data);
    }

    if prefer_html && let Some(html) = find_part_text(payload.parts(), "text/html") {
        return Some(html);
    }
    if let Some(text) = find_part_text(payload.parts(), "text/plain") {
        return Some(text);
    }

    first_data(payload.parts()).and_then(decode_body_data)
}

/// Recursively search message parts for content of the given MIME type
fn find_part_text(parts: &[MessagePart], mime_type: &str) -> Option<String> {
    for part in parts {
        if part.filename().is_none()
            && part.mime_type().starts_with(mime_type)
            && let Some(text) = part.data().and_then(decode_body_data)
        {
            return Some(text);
        }

        if let Some(text) = find_part_text(part.parts(), mime_type) {
            return Some(text);
        }
    }

    None
}

fn first_data(parts: &[MessagePart]) -> Option<&str> {
    parts
        .iter()
        .find_map(|part| part.data().or_else(|| first_data(part.parts())))
}

/// Every part (at any depth) that carries a filename and its bytes or an
/// attachment reference, in document order
pub fn attachment_parts(payload: &MessagePayload) -> Vec<AttachmentPart> {
    let mut found = Vec::new();
    collect_attachments(payload.parts(), &mut found);
    found
}

fn collect_attachments(parts: &[MessagePart], found: &mut Vec<AttachmentPart>) {
    for part in parts {
        if let Some(filename) = part.filename() {
            let attachment_id = part.attachment_id().map(str::to_string);
            let data = part.data().map(str::to_string);
            if attachment_id.is_some() || data.is_some() {
                found.push(AttachmentPart {
                    filename: filename.to_string(),
                    mime_type: part.mime_type().to_string(),
                    attachment_id,
                    data,
                });
            }
        }
        collect_attachments(part.parts(), found);
    }
}

/// First address of the `From` header
pub fn sender(message: &GmailMessage) -> Option<EmailAddress> {
    message_header(message, "From")
        .and_then(|from| parse_address_list(&from).into_iter().next())
}

/// `To`, `Cc` and `Bcc` address lists; entries without an email are dropped
pub fn recipients(message: &GmailMessage) -> Recipients {
    let list = |name: &str| {
        message_header(message, name)
            .map(|value| parse_address_list(&value))
            .unwrap_or_default()
    };
    Recipients {
        to: list("To"),
        cc: list("Cc"),
        bcc: list("Bcc"),
    }
}

/// Parse the RFC 2822 `Date` header
pub fn message_date(message: &GmailMessage) -> Option<DateTime<FixedOffset>> {
    let raw = message_header(message, "Date")?;
    parse_date_header(&raw)
}

/// Parse an RFC 2822 date, tolerating a trailing comment such as `(UTC)`
pub fn parse_date_header(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let without_comment = match raw.rfind('(') {
        Some(i) if raw.ends_with(')') => raw[..i].trim_end(),
        _ => raw,
    };
    DateTime::parse_from_rfc2822(without_comment).ok()
}

/// Server receive time (milliseconds since epoch)
pub fn internal_date(message: &GmailMessage) -> Option<DateTime<Utc>> {
    let millis: i64 = message.internal_date.as_deref()?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Snippet with HTML entities decoded
pub fn snippet(message: &GmailMessage) -> String {
    message
        .snippet
        .as_deref()
        .map(decode_html_entities)
        .unwrap_or_default()
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary.
pub fn decode_body_data(data: &str) -> Option<String> {
    let decoded = decode_base64(data).ok()?;
    String::from_utf8(decoded).ok()
}

/// Decode HTML entities in snippet text
pub fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Convert an API label to the domain model
pub fn label_from_api(label: ApiLabel) -> Label {
    let id = LabelId::new(label.id);
    let is_system = label.label_type.as_deref() == Some("system") || id.is_system();
    Label {
        id,
        name: label.name,
        is_system,
        message_count: label.messages_total.unwrap_or(0),
        unread_count: label.messages_unread.unwrap_or(0),
        color: label.color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::encoding::encode_url_safe;
    use crate::gmail::api::{Header, MessageBody};

    fn make_test_payload(headers: Vec<(&str, &str)>) -> MessagePayload {
        MessagePayload {
            headers: Some(headers.into_iter().map(|(n, v)| Header::new(n, v)).collect()),
            body: Some(MessageBody {
                size: Some(0),
                ..Default::default()
            }),
            mime_type: Some("text/plain".to_string()),
            ..Default::default()
        }
    }

    fn text_part(mime_type: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(MessageBody {
                data: Some(encode_url_safe(text.as_bytes())),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn message_with(headers: Vec<(&str, &str)>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            payload: Some(make_test_payload(headers)),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_header() {
        let payload = make_test_payload(vec![
            ("From", "test@example.com"),
            ("Subject", "Test Subject"),
        ]);

        assert_eq!(extract_header(&payload, "From"), Some("test@example.com".to_string()));
        assert_eq!(extract_header(&payload, "Subject"), Some("Test Subject".to_string()));
        assert_eq!(extract_header(&payload, "Cc"), None);
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let payload = make_test_payload(vec![("FROM", "test@example.com")]);
        assert_eq!(extract_header(&payload, "from"), Some("test@example.com".to_string()));
    }

    #[test]
    fn test_message_headers_filter() {
        let message = message_with(vec![("From", "a@b.com"), ("Subject", "S"), ("X-Custom", "1")]);
        let all = message_headers(&message, None);
        assert_eq!(all.len(), 3);

        let some = message_headers(&message, Some(&["subject", "date"][..]));
        assert_eq!(some.len(), 1);
        assert_eq!(some.get("Subject").map(String::as_str), Some("S"));
    }

    #[test]
    fn test_simple_body() {
        let mut payload = make_test_payload(vec![]);
        payload.body = Some(MessageBody {
            data: Some("SGVsbG8sIFdvcmxkIQ".to_string()),
            ..Default::default()
        });
        assert_eq!(extract_body(&payload, false), Some("Hello, World!".to_string()));
        assert_eq!(extract_body(&payload, true), Some("Hello, World!".to_string()));
    }

    #[test]
    fn test_multipart_body_preference() {
        let payload = MessagePayload {
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![
                text_part("text/plain", "plain"),
                text_part("text/html", "<b>html</b>"),
            ]),
            ..Default::default()
        };
        assert_eq!(extract_body(&payload, false), Some("plain".to_string()));
        assert_eq!(extract_body(&payload, true), Some("<b>html</b>".to_string()));
    }

    #[test]
    fn test_nested_body_and_fallback() {
        let nested = MessagePayload {
            parts: Some(vec![MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                parts: Some(vec![text_part("text/plain", "deep")]),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert_eq!(extract_body(&nested, true), Some("deep".to_string()));

        let other = MessagePayload {
            parts: Some(vec![text_part("text/calendar", "BEGIN:VCALENDAR")]),
            ..Default::default()
        };
        assert_eq!(extract_body(&other, false), Some("BEGIN:VCALENDAR".to_string()));
    }

    #[test]
    fn test_attachment_parts() {
        let mut pdf = text_part("application/pdf", "");
        pdf.filename = Some("a.pdf".to_string());
        pdf.body = Some(MessageBody {
            attachment_id: Some("att-1".to_string()),
            ..Default::default()
        });
        let mut inline = text_part("text/plain", "tiny");
        inline.filename = Some("note.txt".to_string());
        let mut unnamed = text_part("image/png", "x");
        unnamed.filename = Some(String::new());

        let payload = MessagePayload {
            parts: Some(vec![
                text_part("text/plain", "body"),
                MessagePart {
                    parts: Some(vec![pdf, unnamed]),
                    ..Default::default()
                },
                inline,
            ]),
            ..Default::default()
        };

        let found = attachment_parts(&payload);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].filename, "a.pdf");
        assert_eq!(found[0].attachment_id.as_deref(), Some("att-1"));
        assert_eq!(found[1].filename, "note.txt");
        assert!(found[1].data.is_some());
    }

    #[test]
    fn test_sender_and_recipients() {
        let message = message_with(vec![
            ("From", "\"Doe, John\" <john@example.com>"),
            ("To", "a@b.com, Undisclosed recipients:;"),
            ("Cc", "Carol <carol@example.com>"),
        ]);
        let from = sender(&message).unwrap();
        assert_eq!(from.name.as_deref(), Some("Doe, John"));

        let recipients = recipients(&message);
        assert_eq!(recipients.to, vec![EmailAddress::new("a@b.com")]);
        assert_eq!(recipients.cc[0].email, "carol@example.com");
        assert!(recipients.bcc.is_empty());
    }

    #[test]
    fn test_message_date() {
        let message = message_with(vec![("Date", "Tue, 1 Jul 2003 10:52:37 +0200 (CEST)")]);
        let date = message_date(&message).unwrap();
        assert_eq!(date.to_rfc3339(), "2003-07-01T10:52:37+02:00");
        assert!(message_date(&message_with(vec![("Date", "not a date")])).is_none());
    }

    #[test]
    fn test_internal_date() {
        let message = GmailMessage {
            internal_date: Some("1700000000000".to_string()),
            ..Default::default()
        };
        assert_eq!(internal_date(&message).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("Hello &amp; welcome &lt;user&gt;"),
            "Hello & welcome <user>"
        );
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_label_from_api() {
        let label = label_from_api(ApiLabel {
            id: "Label_1".to_string(),
            name: "Receipts".to_string(),
            label_type: Some("user".to_string()),
            messages_total: Some(4),
            messages_unread: None,
            color: None,
        });
        assert!(!label.is_system);
        assert_eq!(label.message_count, 4);
        assert_eq!(label.unread_count, 0);
    }
}

//! Email addresses and header address-list parsing

use mail_parser::{Address, MessageParser};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MailError, Result};

/// Characters that force a display name into a quoted-string (RFC 5322 specials)
const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe"); never empty or padded
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: clean_name(&name.into()),
            email: email.into(),
        }
    }

    /// Parse a single mailbox such as `John Doe <john@example.com>`,
    /// `"Doe, John" <john@example.com>`, `<john@example.com>`,
    /// `john@example.com` or `john@example.com (John Doe)`.
    ///
    /// Returns `None` unless exactly one usable address is present; never
    /// invents one.
    pub fn parse(s: &str) -> Option<Self> {
        match parse_address_list(s).as_slice() {
            [single] => Some(single.clone()),
            _ => None,
        }
    }

    /// Format for a header value, quoting the name when it holds specials
    pub fn to_header(&self) -> String {
        match &self.name {
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\" <{}>", escaped, self.email)
            }
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Parse a header value holding zero or more comma-separated mailboxes.
///
/// Entries without an extractable address are skipped. Never fails; the
/// worst case is an empty list. When the header as a whole yields nothing
/// (an unbalanced quote swallows everything after it), each comma-separated
/// piece is tried on its own.
pub fn parse_address_list(header: &str) -> Vec<EmailAddress> {
    let addresses = parse_header_value(header);
    if !addresses.is_empty() || !header.contains(',') {
        return addresses;
    }
    header.split(',').flat_map(parse_header_value).collect()
}

/// Like [`parse_address_list`] but reports an empty result as
/// [`MailError::ParseAmbiguous`].
pub fn require_addresses(header: &str) -> Result<Vec<EmailAddress>> {
    let addresses = parse_address_list(header);
    if addresses.is_empty() {
        return Err(MailError::ParseAmbiguous(header.to_string()));
    }
    Ok(addresses)
}

/// Join addresses into a header value
pub fn format_address_list(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(EmailAddress::to_header)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Flatten a parsed address header (lists and groups alike), keeping only
/// entries with a usable address
pub(crate) fn addresses_from_parsed(parsed: Option<&Address<'_>>) -> Vec<EmailAddress> {
    let Some(parsed) = parsed else {
        return Vec::new();
    };
    parsed
        .iter()
        .filter_map(|addr| {
            let email = addr.address().map(str::trim).unwrap_or_default();
            if !valid_email(email) {
                log::debug!(
                    "Skipping address entry without usable email: {:?} {:?}",
                    addr.name(),
                    addr.address()
                );
                return None;
            }
            Some(EmailAddress {
                name: addr.name().and_then(clean_name),
                email: email.to_string(),
            })
        })
        .collect()
}

/// Run a bare header value through the message parser as a `To` header
fn parse_header_value(value: &str) -> Vec<EmailAddress> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    let raw = format!("To: {}\r\n\r\n", value.replace(['\r', '\n'], " "));
    match MessageParser::default().parse_headers(raw.as_bytes()) {
        Some(message) => addresses_from_parsed(message.to()),
        None => Vec::new(),
    }
}

/// A single address needs a non-empty local part and domain around exactly
/// one `@`, and no whitespace (two bare addresses run together are rejected)
fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Trim a display name; blank names become `None`
fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_with_name() {
        let addrs = parse_address_list("John Doe <john@example.com>");
        assert_eq!(addrs, vec![EmailAddress::with_name("John Doe", "john@example.com")]);
    }

    #[test]
    fn test_parse_email_without_name() {
        let addr = EmailAddress::parse("john@example.com").unwrap();
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_email_with_angle_brackets_no_name() {
        let addr = EmailAddress::parse("<john@example.com>").unwrap();
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_parse_two_bare_addresses() {
        let addrs = parse_address_list("a@b.com, c@d.com");
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0], EmailAddress::new("a@b.com"));
        assert_eq!(addrs[1], EmailAddress::new("c@d.com"));
    }

    #[test]
    fn test_parse_not_an_email() {
        assert!(parse_address_list("not-an-email").is_empty());
        assert!(parse_address_list("").is_empty());
        assert!(parse_address_list(" , ,, ").is_empty());
    }

    #[test]
    fn test_parse_mixed_list() {
        let addrs = parse_address_list("Name <a@b.com>, c@d.com");
        assert_eq!(addrs[0].name.as_deref(), Some("Name"));
        assert_eq!(addrs[0].email, "a@b.com");
        assert_eq!(addrs[1].name, None);
        assert_eq!(addrs[1].email, "c@d.com");
    }

    #[test]
    fn test_quoted_name_with_comma() {
        let addrs = parse_address_list("\"Doe, John\" <john@example.com>, jane@example.com");
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(addrs[0].email, "john@example.com");
    }

    #[test]
    fn test_comment_style_name() {
        let addr = EmailAddress::parse("john@example.com (John Doe)").unwrap();
        assert_eq!(addr.name.as_deref(), Some("John Doe"));
        assert_eq!(addr.email, "john@example.com");
    }

    #[test]
    fn test_malformed_entry_skipped_not_fabricated() {
        let addrs = parse_address_list("Undisclosed <recipients>, ok@example.com, broken@");
        assert_eq!(addrs, vec![EmailAddress::new("ok@example.com")]);
    }

    #[test]
    fn test_two_bare_at_tokens_in_one_entry_is_ambiguous() {
        assert!(EmailAddress::parse("a@b.com c@d.com").is_none());
    }

    #[test]
    fn test_whitespace_trimmed() {
        let addr = EmailAddress::parse("   Jane   Roe   <  jane@example.com >  ").unwrap();
        assert_eq!(addr.name.as_deref(), Some("Jane   Roe"));
        assert_eq!(addr.email, "jane@example.com");
    }

    #[test]
    fn test_empty_quoted_name_is_none() {
        let addr = EmailAddress::parse("\"\" <x@y.org>").unwrap();
        assert_eq!(addr.name, None);
    }

    #[test]
    fn test_encoded_word_name_decoded() {
        let addr = EmailAddress::parse("=?utf-8?B?SsO2cmc=?= <jorg@example.de>").unwrap();
        assert_eq!(addr.name.as_deref(), Some("Jörg"));
    }

    #[test]
    fn test_require_addresses() {
        assert!(require_addresses("x@y.z").is_ok());
        assert!(matches!(
            require_addresses("nobody"),
            Err(MailError::ParseAmbiguous(_))
        ));
    }

    #[test]
    fn test_to_header_quotes_specials() {
        let addr = EmailAddress::with_name("Doe, John", "john@example.com");
        assert_eq!(addr.to_header(), "\"Doe, John\" <john@example.com>");
        let reparsed = parse_address_list(&addr.to_header());
        assert_eq!(reparsed, vec![addr]);
    }

    #[test]
    fn test_to_header_keeps_unicode_name() {
        let addr = EmailAddress::with_name("Jörg Müller", "jorg@example.de");
        assert_eq!(addr.to_header(), "Jörg Müller <jorg@example.de>");
        assert_eq!(EmailAddress::parse(&addr.to_header()), Some(addr));
    }

    #[test]
    fn test_with_name_trims_and_drops_blank() {
        let addr = EmailAddress::with_name("  Ann ", "ann@example.com");
        assert_eq!(addr.name.as_deref(), Some("Ann"));
        assert_eq!(EmailAddress::with_name(" \t ", "ann@example.com").name, None);
    }

    #[test]
    fn test_unbalanced_quote_falls_back_to_entries() {
        let addrs = parse_address_list("\"Ann <ann@example.com>, bob@example.com");
        assert_eq!(addrs, vec![EmailAddress::new("bob@example.com")]);
    }

    #[test]
    fn test_groups_are_flattened() {
        let addrs = parse_address_list("Team: ann@x.com, Bob <bob@y.com>;, carol@z.com");
        let emails: Vec<&str> = addrs.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["ann@x.com", "bob@y.com", "carol@z.com"]);
        assert_eq!(addrs[1].name.as_deref(), Some("Bob"));
        assert!(parse_address_list("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_folded_header_value() {
        let addrs = parse_address_list("Ann <ann@example.com>,\r\n bob@example.com");
        assert_eq!(addrs.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EmailAddress::with_name("John Doe", "john@example.com").display(),
            "John Doe <john@example.com>"
        );
        assert_eq!(EmailAddress::new("john@example.com").display(), "john@example.com");
    }

    #[test]
    fn test_format_address_list() {
        let list = vec![
            EmailAddress::with_name("Ann", "ann@example.com"),
            EmailAddress::new("bob@example.com"),
        ];
        assert_eq!(format_address_list(&list), "Ann <ann@example.com>, bob@example.com");
    }
}

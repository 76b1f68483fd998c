//! Message identifiers and read-side message views

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::EmailAddress;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a thread (Gmail thread ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How much of a message the store should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Headers, body and part structure
    #[default]
    Full,
    /// Headers and labels only
    Metadata,
    /// IDs and labels only
    Minimal,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
            MessageFormat::Minimal => "minimal",
        }
    }
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(MessageFormat::Full),
            "metadata" => Ok(MessageFormat::Metadata),
            "minimal" => Ok(MessageFormat::Minimal),
            other => Err(format!("unknown message format: {other}")),
        }
    }
}

/// Recipient lists extracted from the To/Cc/Bcc headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format_parse() {
        assert_eq!("FULL".parse::<MessageFormat>(), Ok(MessageFormat::Full));
        assert_eq!("metadata".parse::<MessageFormat>(), Ok(MessageFormat::Metadata));
        assert_eq!(MessageFormat::Minimal.as_str(), "minimal");
        assert!("raw".parse::<MessageFormat>().is_err());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let id = MessageId::new("17c0f4a5f3e12cb1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"17c0f4a5f3e12cb1\"");
        assert_eq!(id.to_string(), "17c0f4a5f3e12cb1");
    }
}

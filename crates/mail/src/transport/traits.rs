//! Transport trait definitions

use anyhow::Result;

use crate::compose::EncodedMessage;
use crate::gmail::api::{Draft, GmailMessage, ListMessagesResponse, SentMessage, WatchResponse};
use crate::models::{Label, LabelColor, LabelDelta, LabelId, MessageFormat, MessageId, ThreadId};

/// One page request against the message list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Gmail search query, if any
    pub query: Option<String>,
    /// Only messages carrying all of these label IDs
    pub label_ids: Vec<String>,
    /// Page size (the API caps this at 500)
    pub max_results: usize,
    /// Opaque cursor from the previous page
    pub page_token: Option<String>,
}

impl ListRequest {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.trim().is_empty() { None } else { Some(query) };
        self
    }

    pub fn with_label_ids(mut self, label_ids: Vec<String>) -> Self {
        self.label_ids = label_ids;
        self
    }

    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// Trait for mailbox transport operations
///
/// This trait abstracts over the remote mail service. Implementations perform
/// the actual I/O; callers never retry through it, so any retry policy lives
/// inside the implementation.
pub trait MailTransport: Send + Sync {
    /// Send an encoded message
    fn send_message(&self, message: &EncodedMessage) -> Result<SentMessage>;

    /// Save an encoded message as a draft
    fn create_draft(&self, message: &EncodedMessage) -> Result<Draft>;

    /// Send a previously saved draft
    fn send_draft(&self, draft_id: &str) -> Result<SentMessage>;

    /// Fetch one page of message references
    fn list_messages(&self, request: &ListRequest) -> Result<ListMessagesResponse>;

    /// Fetch a message at the given detail level
    fn get_message(&self, id: &MessageId, format: MessageFormat) -> Result<GmailMessage>;

    /// Fetch all messages of a thread, oldest first
    fn get_thread(&self, id: &ThreadId, format: MessageFormat) -> Result<Vec<GmailMessage>>;

    /// Fetch and decode an attachment's bytes
    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>>;

    /// Apply a label delta to one message, returning its updated record
    fn modify_labels(&self, id: &MessageId, delta: &LabelDelta) -> Result<GmailMessage>;

    /// Apply a label delta to many messages; either all change or none do
    fn batch_modify_labels(&self, ids: &[MessageId], delta: &LabelDelta) -> Result<()>;

    /// Permanently delete a message
    fn delete_message(&self, id: &MessageId) -> Result<()>;

    /// List all labels in the mailbox
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a user label
    fn create_label(&self, name: &str, color: Option<LabelColor>) -> Result<Label>;

    /// Start push notifications to a Pub/Sub topic
    fn watch(&self, topic: &str, label_ids: &[String]) -> Result<WatchResponse>;

    /// Stop push notifications
    fn stop_watch(&self) -> Result<()>;

    /// Look up a label ID by display name (case-insensitive)
    fn resolve_label_id(&self, name: &str) -> Result<Option<LabelId>> {
        Ok(self
            .list_labels()?
            .into_iter()
            .find(|label| label.name.eq_ignore_ascii_case(name))
            .map(|label| label.id))
    }
}

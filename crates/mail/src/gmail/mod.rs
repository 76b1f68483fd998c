//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow
//! - Gmail REST client implementing [`crate::transport::MailTransport`]
//! - Helpers that read headers, bodies and attachments out of API payloads

mod auth;
mod client;
pub mod normalize;

pub use auth::GmailAuth;
pub use client::GmailClient;

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::{LabelColor, LabelSet, MessageId, ThreadId};

    /// Response from listing messages
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: String,
    }

    impl MessageRef {
        pub fn message_id(&self) -> MessageId {
            MessageId::new(self.id.as_str())
        }
    }

    /// Message from the Gmail API, at any detail level
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: String,
        pub label_ids: Option<Vec<String>>,
        pub snippet: Option<String>,
        pub history_id: Option<String>,
        pub internal_date: Option<String>,
        pub size_estimate: Option<u64>,
        pub payload: Option<MessagePayload>,
    }

    impl GmailMessage {
        pub fn message_id(&self) -> MessageId {
            MessageId::new(self.id.as_str())
        }

        pub fn thread_id(&self) -> ThreadId {
            ThreadId::new(self.thread_id.as_str())
        }

        pub fn label_set(&self) -> LabelSet {
            self.label_ids.iter().flatten().cloned().collect()
        }

        /// Top-level headers, empty when the payload was not requested
        pub fn headers(&self) -> &[Header] {
            self.payload
                .as_ref()
                .and_then(|p| p.headers.as_deref())
                .unwrap_or_default()
        }
    }

    /// The top-level payload has the same shape as any nested part
    pub type MessagePayload = MessagePart;

    /// Message part (for multipart messages)
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    impl MessagePart {
        pub fn mime_type(&self) -> &str {
            self.mime_type.as_deref().unwrap_or_default()
        }

        pub fn filename(&self) -> Option<&str> {
            self.filename.as_deref().filter(|f| !f.is_empty())
        }

        pub fn data(&self) -> Option<&str> {
            self.body.as_ref().and_then(|b| b.data.as_deref())
        }

        pub fn attachment_id(&self) -> Option<&str> {
            self.body.as_ref().and_then(|b| b.attachment_id.as_deref())
        }

        pub fn parts(&self) -> &[MessagePart] {
            self.parts.as_deref().unwrap_or_default()
        }
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    impl Header {
        pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                value: value.into(),
            }
        }
    }

    /// Part body: inline URL-safe base64 data or a reference to fetch it
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub attachment_id: Option<String>,
        pub size: Option<u64>,
        pub data: Option<String>,
    }

    /// Response from listing labels
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<ApiLabel>>,
    }

    /// Label as returned by the API
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApiLabel {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub label_type: Option<String>,
        pub messages_total: Option<u32>,
        pub messages_unread: Option<u32>,
        pub color: Option<LabelColor>,
    }

    /// Body of `labels.create`
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateLabelRequest {
        pub name: String,
        pub message_list_visibility: String,
        pub label_list_visibility: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub color: Option<LabelColor>,
    }

    impl CreateLabelRequest {
        /// A label visible in both the message list and the label list
        pub fn visible(name: impl Into<String>, color: Option<LabelColor>) -> Self {
            Self {
                name: name.into(),
                message_list_visibility: "show".to_string(),
                label_list_visibility: "labelShow".to_string(),
                color,
            }
        }
    }

    /// Body of `messages.modify`
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest {
        pub add_label_ids: Vec<String>,
        pub remove_label_ids: Vec<String>,
    }

    /// Body of `messages.batchModify`
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BatchModifyRequest {
        pub ids: Vec<String>,
        pub add_label_ids: Vec<String>,
        pub remove_label_ids: Vec<String>,
    }

    /// Body of `messages.send`, and the message inside a draft
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RawMessage {
        pub raw: String,
    }

    /// Body of `drafts.create`
    #[derive(Debug, Clone, Serialize)]
    pub struct DraftRequest {
        pub message: RawMessage,
    }

    /// Body of `drafts.send`
    #[derive(Debug, Clone, Serialize)]
    pub struct SendDraftRequest {
        pub id: String,
    }

    /// Record returned after sending
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SentMessage {
        pub id: String,
        pub thread_id: String,
        pub label_ids: Option<Vec<String>>,
    }

    /// A saved draft
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Draft {
        pub id: String,
        pub message: Option<SentMessage>,
    }

    /// Thread with its messages
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ThreadResponse {
        pub id: String,
        pub messages: Option<Vec<GmailMessage>>,
    }

    /// Body of `users.watch`
    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WatchRequest {
        pub topic_name: String,
        pub label_ids: Vec<String>,
    }

    /// Response from `users.watch`
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct WatchResponse {
        pub history_id: String,
        pub expiration: String,
    }

}

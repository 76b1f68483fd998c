//! Gmail API HTTP client
//!
//! Implements [`MailTransport`] over the Gmail REST API v1.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::GmailAuth;
use super::api::{
    ApiLabel, BatchModifyRequest, CreateLabelRequest, Draft, DraftRequest, GmailMessage,
    ListLabelsResponse, ListMessagesResponse, MessageBody, ModifyMessageRequest, RawMessage,
    SendDraftRequest, SentMessage, ThreadResponse, WatchRequest, WatchResponse,
};
use super::normalize::label_from_api;
use crate::compose::EncodedMessage;
use crate::compose::encoding::decode_base64;
use crate::error::ResourceNotFound;
use crate::models::{Label, LabelColor, LabelDelta, MessageFormat, MessageId, ThreadId};
use crate::query::MAX_PAGE_SIZE;
use crate::transport::{ListRequest, MailTransport};

/// Attempts for idempotent reads before giving up
const MAX_ATTEMPTS: u32 = 3;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
    user_id: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users";

    /// Create a client acting as the authenticated user (`me`)
    pub fn new(auth: GmailAuth) -> Self {
        Self::for_user(auth, "me")
    }

    pub fn for_user(auth: GmailAuth, user_id: impl Into<String>) -> Self {
        Self {
            auth,
            user_id: user_id.into(),
        }
    }

    /// Check if the client is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Trigger authentication flow
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }

    /// `users/{user_id}/{segments...}`
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(Self::BASE_URL).context("Invalid Gmail base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Gmail base URL cannot take path segments"))?
            .push(&self.user_id)
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.get_access_token()?))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url, what: &str) -> Result<T> {
        with_retry(what, || {
            let mut response = ureq::get(url.as_str())
                .header("Authorization", &self.bearer()?)
                .call()
                .map_err(|e| request_error(e, what))?;
            response
                .body_mut()
                .read_json()
                .with_context(|| format!("Failed to parse {what} response"))
        })
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let mut response = ureq::post(url.as_str())
            .header("Authorization", &self.bearer()?)
            .send_json(body)
            .map_err(|e| request_error(e, what))?;
        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {what} response"))
    }

    /// POST whose response body is empty or irrelevant
    fn post_no_content<B: Serialize>(&self, url: &Url, body: Option<&B>, what: &str) -> Result<()> {
        let request = ureq::post(url.as_str()).header("Authorization", &self.bearer()?);
        match body {
            Some(body) => request.send_json(body),
            None => request.send_empty(),
        }
        .map_err(|e| request_error(e, what))?;
        Ok(())
    }
}

impl MailTransport for GmailClient {
    fn send_message(&self, message: &EncodedMessage) -> Result<SentMessage> {
        let url = self.endpoint(&["messages", "send"])?;
        let sent: SentMessage = self.post_json(
            &url,
            &RawMessage {
                raw: message.raw.clone(),
            },
            "send message",
        )?;
        log::info!("Sent message {}", sent.id);
        Ok(sent)
    }

    fn create_draft(&self, message: &EncodedMessage) -> Result<Draft> {
        let url = self.endpoint(&["drafts"])?;
        let request = DraftRequest {
            message: RawMessage {
                raw: message.raw.clone(),
            },
        };
        let draft: Draft = self.post_json(&url, &request, "create draft")?;
        log::info!("Created draft {}", draft.id);
        Ok(draft)
    }

    fn send_draft(&self, draft_id: &str) -> Result<SentMessage> {
        let url = self.endpoint(&["drafts", "send"])?;
        let request = SendDraftRequest {
            id: draft_id.to_string(),
        };
        let sent: SentMessage = self.post_json(&url, &request, "send draft")?;
        log::info!("Sent draft {} as message {}", draft_id, sent.id);
        Ok(sent)
    }

    fn list_messages(&self, request: &ListRequest) -> Result<ListMessagesResponse> {
        let mut url = self.endpoint(&["messages"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(
                "maxResults",
                &request.max_results.clamp(1, MAX_PAGE_SIZE).to_string(),
            );
            if let Some(query) = &request.query {
                pairs.append_pair("q", query);
            }
            for label in &request.label_ids {
                pairs.append_pair("labelIds", label);
            }
            if let Some(token) = &request.page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        self.get_json(&url, "list messages")
    }

    fn get_message(&self, id: &MessageId, format: MessageFormat) -> Result<GmailMessage> {
        let mut url = self.endpoint(&["messages", id.as_str()])?;
        url.query_pairs_mut().append_pair("format", format.as_str());
        self.get_json(&url, &format!("message {id}"))
    }

    fn get_thread(&self, id: &ThreadId, format: MessageFormat) -> Result<Vec<GmailMessage>> {
        let mut url = self.endpoint(&["threads", id.as_str()])?;
        url.query_pairs_mut().append_pair("format", format.as_str());
        let thread: ThreadResponse = self.get_json(&url, &format!("thread {}", id.as_str()))?;
        Ok(thread.messages.unwrap_or_default())
    }

    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&["messages", message_id.as_str(), "attachments", attachment_id])?;
        let what = format!("attachment of message {message_id}");
        let body: MessageBody = self.get_json(&url, &what)?;
        let data = body.data.context("Attachment response has no data")?;
        decode_base64(&data).context("Attachment data is not valid base64")
    }

    fn modify_labels(&self, id: &MessageId, delta: &LabelDelta) -> Result<GmailMessage> {
        let url = self.endpoint(&["messages", id.as_str(), "modify"])?;
        let request = ModifyMessageRequest {
            add_label_ids: delta.add_ids(),
            remove_label_ids: delta.remove_ids(),
        };
        self.post_json(&url, &request, &format!("message {id}"))
    }

    fn batch_modify_labels(&self, ids: &[MessageId], delta: &LabelDelta) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["messages", "batchModify"])?;
        let request = BatchModifyRequest {
            ids: ids.iter().map(|id| id.0.clone()).collect(),
            add_label_ids: delta.add_ids(),
            remove_label_ids: delta.remove_ids(),
        };
        self.post_no_content(&url, Some(&request), "batch modify messages")
    }

    fn delete_message(&self, id: &MessageId) -> Result<()> {
        let url = self.endpoint(&["messages", id.as_str()])?;
        let what = format!("message {id}");
        ureq::delete(url.as_str())
            .header("Authorization", &self.bearer()?)
            .call()
            .map_err(|e| request_error(e, &what))?;
        log::info!("Deleted message {id}");
        Ok(())
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let url = self.endpoint(&["labels"])?;
        let response: ListLabelsResponse = self.get_json(&url, "list labels")?;
        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(label_from_api)
            .collect())
    }

    fn create_label(&self, name: &str, color: Option<LabelColor>) -> Result<Label> {
        let url = self.endpoint(&["labels"])?;
        let request = CreateLabelRequest::visible(name, color);
        let label: ApiLabel = self.post_json(&url, &request, "create label")?;
        log::info!("Created label {} ({})", label.name, label.id);
        Ok(label_from_api(label))
    }

    fn watch(&self, topic: &str, label_ids: &[String]) -> Result<WatchResponse> {
        let url = self.endpoint(&["watch"])?;
        let request = WatchRequest {
            topic_name: topic.to_string(),
            label_ids: label_ids.to_vec(),
        };
        self.post_json(&url, &request, "watch mailbox")
    }

    fn stop_watch(&self) -> Result<()> {
        let url = self.endpoint(&["stop"])?;
        self.post_no_content::<()>(&url, None, "stop watch")
    }
}

/// Convert a ureq failure, turning HTTP 404 into [`ResourceNotFound`]
fn request_error(err: ureq::Error, what: &str) -> anyhow::Error {
    match err {
        ureq::Error::StatusCode(404) => ResourceNotFound(what.to_string()).into(),
        other => anyhow::Error::new(other).context(format!("Gmail request failed: {what}")),
    }
}

/// Rate limiting, server errors and I/O failures are worth another try
fn is_retryable(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ureq::Error>() {
        Some(ureq::Error::StatusCode(code)) => *code == 429 || *code >= 500,
        Some(ureq::Error::Io(_)) => true,
        _ => false,
    }
}

/// Run an idempotent request with exponential backoff
fn with_retry<T>(what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut delay = Duration::from_millis(100);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                log::warn!("Retrying {what} after attempt {attempt} failed: {e:#}");
                std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

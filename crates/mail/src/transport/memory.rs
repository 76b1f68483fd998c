//! In-process mailbox implementing [`MailTransport`]
//!
//! Holds messages, labels, drafts and attachments behind a mutex. Listing
//! honours the same search syntax the query builder emits, so code written
//! against the Gmail API can be exercised without a network.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::actions::apply_delta;
use crate::compose::encoding::encode_url_safe;
use crate::compose::{Attachment, EncodedMessage, mime};
use crate::error::ResourceNotFound;
use crate::gmail::api::{
    Draft, GmailMessage, Header, ListMessagesResponse, MessageBody, MessagePart, MessageRef,
    SentMessage, WatchResponse,
};
use crate::gmail::normalize::{extract_body, internal_date, message_header};
use crate::models::{
    EmailAddress, Label, LabelColor, LabelDelta, LabelId, LabelSet, MessageFormat, MessageId,
    ThreadId, format_address_list,
};
use crate::query::{MAX_PAGE_SIZE, MailboxQuery, parse_query};
use crate::transport::{ListRequest, MailTransport};

/// Page size when none is configured, matching the Gmail API default
const DEFAULT_PAGE_SIZE: usize = 100;

/// Snippet length in characters
const SNIPPET_LEN: usize = 100;

/// A message to seed into an [`InMemoryTransport`]
#[derive(Debug, Clone, Default)]
pub struct SeedMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub labels: Vec<String>,
    pub thread_id: Option<ThreadId>,
    pub date: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
}

impl SeedMessage {
    pub fn new(
        from: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.labels.extend(labels.iter().map(|l| l.to_string()));
        self
    }

    pub fn at(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn in_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

struct State {
    messages: Vec<GmailMessage>,
    attachments: HashMap<(String, String), Vec<u8>>,
    labels: Vec<Label>,
    /// draft ID -> message ID
    drafts: HashMap<String, String>,
    sent_raw: Vec<EncodedMessage>,
    next_id: u64,
    page_size: usize,
    list_calls: usize,
    last_list_request: Option<ListRequest>,
    watch: Option<(String, Vec<String>)>,
}

impl State {
    fn new() -> Self {
        let labels = LabelId::SYSTEM
            .iter()
            .map(|id| Label::system(*id, *id))
            .collect();
        Self {
            messages: Vec::new(),
            attachments: HashMap::new(),
            labels,
            drafts: HashMap::new(),
            sent_raw: Vec::new(),
            next_id: 1,
            page_size: DEFAULT_PAGE_SIZE,
            list_calls: 0,
            last_list_request: None,
            watch: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn message(&self, id: &MessageId) -> Result<&GmailMessage> {
        self.messages
            .iter()
            .find(|m| m.id == id.as_str())
            .ok_or_else(|| not_found(format!("message {id}")))
    }

    fn message_mut(&mut self, id: &MessageId) -> Result<&mut GmailMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id.as_str())
            .ok_or_else(|| not_found(format!("message {id}")))
    }

    fn check_labels_exist(&self, delta: &LabelDelta) -> Result<()> {
        for label in delta.to_add().iter().chain(delta.to_remove()) {
            if !self.labels.iter().any(|l| &l.id == label) {
                bail!("Invalid label: {label}");
            }
        }
        Ok(())
    }

    /// Label filter by ID or (case-insensitive) display name
    fn label_matches(&self, labels: &LabelSet, filter: &str) -> bool {
        if labels.contains(filter) {
            return true;
        }
        self.labels
            .iter()
            .filter(|l| {
                l.name.eq_ignore_ascii_case(filter) || l.id.as_str().eq_ignore_ascii_case(filter)
            })
            .any(|l| labels.contains(l.id.as_str()))
    }

    fn matches(&self, message: &GmailMessage, query: &MailboxQuery, label_ids: &[String]) -> bool {
        let labels = message.label_set();

        let wants_trash = query
            .label_filters
            .iter()
            .chain(label_ids)
            .any(|l| l == LabelId::TRASH || l == LabelId::SPAM);
        if !wants_trash && (labels.is_trashed() || labels.contains(LabelId::SPAM)) {
            return false;
        }

        if !label_ids.iter().all(|id| labels.contains(id)) {
            return false;
        }
        if !query.label_filters.iter().all(|f| self.label_matches(&labels, f)) {
            return false;
        }
        if query.unread_only && !labels.is_unread() {
            return false;
        }

        if let Some(from) = &query.from {
            let sender = message_header(message, "From").unwrap_or_default();
            if !contains_ignore_case(&sender, from) {
                return false;
            }
        }

        let day = internal_date(message).map(|d| d.date_naive());
        if let Some(start) = query.date_range.start
            && day.is_none_or(|d| d < start)
        {
            return false;
        }
        if let Some(end) = query.date_range.end
            && day.is_none_or(|d| d >= end)
        {
            return false;
        }

        query.terms.iter().all(|term| {
            let needle = term.trim_matches('"');
            let subject = message_header(message, "Subject").unwrap_or_default();
            let body = message
                .payload
                .as_ref()
                .and_then(|p| extract_body(p, false))
                .unwrap_or_default();
            contains_ignore_case(&subject, needle)
                || contains_ignore_case(message.snippet.as_deref().unwrap_or(""), needle)
                || contains_ignore_case(&body, needle)
        })
    }

    fn store(&mut self, seed: SeedMessage) -> MessageId {
        let n = self.next_id();
        let id = format!("m{n:04}");
        let thread_id = seed
            .thread_id
            .map(|t| t.0)
            .unwrap_or_else(|| format!("t{n:04}"));
        let date = seed.date.unwrap_or_else(Utc::now);

        let mut headers = vec![
            Header::new("From", seed.from),
            Header::new("Subject", seed.subject),
            Header::new("Date", date.to_rfc2822()),
        ];
        if !seed.to.is_empty() {
            headers.insert(1, Header::new("To", seed.to.join(", ")));
        }

        let text_part = MessagePart {
            mime_type: Some("text/plain".to_string()),
            body: Some(MessageBody {
                size: Some(seed.body.len() as u64),
                data: Some(encode_url_safe(seed.body.as_bytes())),
                ..MessageBody::default()
            }),
            ..MessagePart::default()
        };

        let payload = if seed.attachments.is_empty() {
            MessagePart {
                headers: Some(headers),
                ..text_part
            }
        } else {
            let mut parts = vec![MessagePart {
                part_id: Some("0".to_string()),
                ..text_part
            }];
            for (index, attachment) in seed.attachments.into_iter().enumerate() {
                let attachment_id = format!("att{}", index + 1);
                parts.push(MessagePart {
                    part_id: Some((index + 1).to_string()),
                    mime_type: Some(attachment.mime_type()),
                    filename: Some(attachment.filename.clone()),
                    headers: Some(vec![Header::new(
                        "Content-Type",
                        attachment.content_type.to_string(),
                    )]),
                    body: Some(MessageBody {
                        attachment_id: Some(attachment_id.clone()),
                        size: Some(attachment.data.len() as u64),
                        data: None,
                    }),
                    parts: None,
                });
                self.attachments
                    .insert((id.clone(), attachment_id), attachment.data);
            }
            MessagePart {
                mime_type: Some("multipart/mixed".to_string()),
                headers: Some(headers),
                parts: Some(parts),
                ..MessagePart::default()
            }
        };

        let labels: LabelSet = seed.labels.into_iter().collect();
        self.messages.push(GmailMessage {
            id: id.clone(),
            thread_id,
            label_ids: Some(labels.to_strings()),
            snippet: Some(seed.body.chars().take(SNIPPET_LEN).collect()),
            history_id: Some(n.to_string()),
            internal_date: Some(date.timestamp_millis().to_string()),
            size_estimate: Some(seed.body.len() as u64),
            payload: Some(payload),
        });
        MessageId(id)
    }

    /// Store an outbound message as it would appear in the mailbox
    fn store_outbound(&mut self, message: &EncodedMessage, label: &str) -> Result<GmailMessage> {
        let decoded = mime::decode(message)?;
        let seed = SeedMessage {
            from: format_address_list(&decoded.from),
            to: decoded.to.iter().map(EmailAddress::to_header).collect(),
            subject: decoded.subject,
            body: decoded.body_text.unwrap_or_default(),
            labels: vec![label.to_string()],
            thread_id: None,
            date: None,
            attachments: decoded.attachments,
        };
        let id = self.store(seed);
        self.message(&id).cloned()
    }
}

/// In-memory [`MailTransport`]
pub struct InMemoryTransport {
    state: Mutex<State>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// Empty mailbox with the system labels defined
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a plain-text message received now
    pub fn add_text_message(
        &self,
        from: &str,
        subject: &str,
        body: &str,
        labels: &[&str],
    ) -> MessageId {
        self.add_message(SeedMessage::new(from, subject, body).labels(labels))
    }

    pub fn add_message(&self, seed: SeedMessage) -> MessageId {
        self.state().store(seed)
    }

    /// Largest number of references returned per list call
    pub fn set_page_size(&self, page_size: usize) {
        self.state().page_size = page_size.max(1);
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn last_list_request(&self) -> Option<ListRequest> {
        self.state().last_list_request.clone()
    }

    /// All message IDs in listing order
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.state()
            .messages
            .iter()
            .map(|m| MessageId(m.id.clone()))
            .collect()
    }

    pub fn labels_of(&self, id: &MessageId) -> Option<LabelSet> {
        self.state().message(id).ok().map(GmailMessage::label_set)
    }

    /// Raw messages handed to `send_message` and `send_draft`, oldest first
    pub fn sent_messages(&self) -> Vec<EncodedMessage> {
        self.state().sent_raw.clone()
    }

    /// Topic of the active watch, if any
    pub fn watching(&self) -> Option<String> {
        self.state().watch.as_ref().map(|(topic, _)| topic.clone())
    }
}

impl MailTransport for InMemoryTransport {
    fn send_message(&self, message: &EncodedMessage) -> Result<SentMessage> {
        let mut state = self.state();
        let stored = state.store_outbound(message, LabelId::SENT)?;
        state.sent_raw.push(message.clone());
        Ok(sent(&stored))
    }

    fn create_draft(&self, message: &EncodedMessage) -> Result<Draft> {
        let mut state = self.state();
        let stored = state.store_outbound(message, LabelId::DRAFT)?;
        let draft_id = format!("r{}", state.next_id());
        state.drafts.insert(draft_id.clone(), stored.id.clone());
        Ok(Draft {
            id: draft_id,
            message: Some(sent(&stored)),
        })
    }

    fn send_draft(&self, draft_id: &str) -> Result<SentMessage> {
        let mut state = self.state();
        let message_id = state
            .drafts
            .remove(draft_id)
            .ok_or_else(|| not_found(format!("draft {draft_id}")))?;
        let delta = LabelDelta::new([LabelId::SENT], [LabelId::DRAFT])?;
        let message = state.message_mut(&MessageId(message_id))?;
        message.label_ids = Some(apply_delta(&message.label_set(), &delta).to_strings());
        let result = sent(message);
        Ok(result)
    }

    fn list_messages(&self, request: &ListRequest) -> Result<ListMessagesResponse> {
        let mut state = self.state();
        state.list_calls += 1;
        state.last_list_request = Some(request.clone());

        let query = request
            .query
            .as_deref()
            .map(parse_query)
            .unwrap_or_default();
        let matching: Vec<MessageRef> = state
            .messages
            .iter()
            .filter(|m| state.matches(m, &query, &request.label_ids))
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect();

        let offset = match &request.page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid page token: {token}"))?,
            None => 0,
        };
        let page_size = request
            .max_results
            .clamp(1, MAX_PAGE_SIZE)
            .min(state.page_size);
        let end = (offset + page_size).min(matching.len());
        let page: Vec<MessageRef> = matching
            .get(offset..end)
            .map(<[MessageRef]>::to_vec)
            .unwrap_or_default();

        Ok(ListMessagesResponse {
            next_page_token: (end < matching.len()).then(|| end.to_string()),
            result_size_estimate: Some(matching.len() as u32),
            messages: (!page.is_empty()).then_some(page),
        })
    }

    fn get_message(&self, id: &MessageId, format: MessageFormat) -> Result<GmailMessage> {
        let state = self.state();
        Ok(with_format(state.message(id)?.clone(), format))
    }

    fn get_thread(&self, id: &ThreadId, format: MessageFormat) -> Result<Vec<GmailMessage>> {
        let state = self.state();
        let messages: Vec<GmailMessage> = state
            .messages
            .iter()
            .filter(|m| m.thread_id == id.as_str())
            .map(|m| with_format(m.clone(), format))
            .collect();
        if messages.is_empty() {
            return Err(not_found(format!("thread {}", id.as_str())));
        }
        Ok(messages)
    }

    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>> {
        let state = self.state();
        state.message(message_id)?;
        state
            .attachments
            .get(&(message_id.0.clone(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("attachment {attachment_id} of message {message_id}")))
    }

    fn modify_labels(&self, id: &MessageId, delta: &LabelDelta) -> Result<GmailMessage> {
        let mut state = self.state();
        state.check_labels_exist(delta)?;
        let message = state.message_mut(id)?;
        message.label_ids = Some(apply_delta(&message.label_set(), delta).to_strings());
        Ok(with_format(message.clone(), MessageFormat::Minimal))
    }

    fn batch_modify_labels(&self, ids: &[MessageId], delta: &LabelDelta) -> Result<()> {
        let mut state = self.state();
        state.check_labels_exist(delta)?;
        for id in ids {
            state.message(id)?;
        }
        for id in ids {
            let message = state.message_mut(id)?;
            message.label_ids = Some(apply_delta(&message.label_set(), delta).to_strings());
        }
        Ok(())
    }

    fn delete_message(&self, id: &MessageId) -> Result<()> {
        let mut state = self.state();
        state.message(id)?;
        state.messages.retain(|m| m.id != id.as_str());
        state.attachments.retain(|(message_id, _), _| message_id != id.as_str());
        state.drafts.retain(|_, message_id| message_id != id.as_str());
        Ok(())
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let state = self.state();
        let labels = state
            .labels
            .iter()
            .map(|label| {
                let tagged = state
                    .messages
                    .iter()
                    .map(GmailMessage::label_set)
                    .filter(|set| set.contains(label.id.as_str()));
                let (total, unread) = tagged.fold((0, 0), |(total, unread), set| {
                    (total + 1, unread + u32::from(set.is_unread()))
                });
                label
                    .clone()
                    .with_message_count(total)
                    .with_unread_count(unread)
            })
            .collect();
        Ok(labels)
    }

    fn create_label(&self, name: &str, color: Option<LabelColor>) -> Result<Label> {
        let mut state = self.state();
        if state.labels.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
            bail!("Label name exists or conflicts: {name}");
        }
        let n = state.next_id();
        let mut label = Label::new(format!("Label_{n}"), name);
        label.color = color;
        state.labels.push(label.clone());
        Ok(label)
    }

    fn watch(&self, topic: &str, label_ids: &[String]) -> Result<WatchResponse> {
        let mut state = self.state();
        state.watch = Some((topic.to_string(), label_ids.to_vec()));
        let expiration = Utc::now() + Duration::days(7);
        Ok(WatchResponse {
            history_id: state.next_id.to_string(),
            expiration: expiration.timestamp_millis().to_string(),
        })
    }

    fn stop_watch(&self) -> Result<()> {
        self.state().watch = None;
        Ok(())
    }
}

fn not_found(what: String) -> anyhow::Error {
    anyhow::Error::new(ResourceNotFound(what))
}

fn sent(message: &GmailMessage) -> SentMessage {
    SentMessage {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        label_ids: message.label_ids.clone(),
    }
}

/// Trim a full message down to what the requested format returns
fn with_format(mut message: GmailMessage, format: MessageFormat) -> GmailMessage {
    match format {
        MessageFormat::Full => {}
        MessageFormat::Metadata => {
            message.payload = message.payload.map(|p| MessagePart {
                mime_type: p.mime_type,
                headers: p.headers,
                ..MessagePart::default()
            });
        }
        MessageFormat::Minimal => message.payload = None,
    }
    message
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

//! Mailbox facade
//!
//! [`Mailbox`] is the outward-facing entry point. It composes messages,
//! builds queries and label deltas, and forwards the results to an injected
//! [`MailTransport`]. It holds no other state.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::actions::{ActionHandler, MessageProcessor};
use crate::compose::encoding::decode_base64;
use crate::compose::{AddressInput, AttachmentPaths, ComposedMessage, MessageComposer};
use crate::config::MailSettings;
use crate::error::{MailError, Result};
use crate::gmail::api::{Draft, GmailMessage, MessageRef, SentMessage, WatchResponse};
use crate::gmail::normalize;
use crate::models::{
    EmailAddress, Label, LabelColor, LabelDelta, LabelId, LabelSet, MessageFormat, MessageId,
    Recipients, ThreadId,
};
use crate::query::{DateRange, MailboxQuery, count_matching, list_paged};
use crate::transport::{ListRequest, MailTransport};

/// Result of sending or drafting: the server record plus what happened to
/// the attachments
#[derive(Debug)]
pub struct Receipt<T> {
    pub record: T,
    pub attachment_count: usize,
    /// Attachments that could not be read and were left out
    pub skipped: Vec<MailError>,
}

/// Attachment bytes fetched from a received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAttachment {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Entry point for all mailbox operations
pub struct Mailbox {
    transport: Arc<dyn MailTransport>,
    actions: ActionHandler,
    composer: MessageComposer,
    settings: MailSettings,
}

impl Mailbox {
    pub fn new(transport: Arc<dyn MailTransport>, settings: MailSettings) -> Self {
        Self {
            actions: ActionHandler::new(transport.clone()),
            transport,
            composer: MessageComposer::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &MailSettings {
        &self.settings
    }

    pub fn actions(&self) -> &ActionHandler {
        &self.actions
    }

    // Sending

    pub fn send(
        &self,
        to: impl Into<AddressInput>,
        from: impl Into<AddressInput>,
        subject: &str,
        body: &str,
        attachments: impl Into<AttachmentPaths>,
    ) -> Result<Receipt<SentMessage>> {
        let composed = self.composer.compose(to, from, subject, body, attachments)?;
        let sent = self.transport.send_message(&composed.encoded)?;
        info!("Message sent: {}", sent.id);
        Ok(receipt(sent, composed))
    }

    /// Save a draft without sending it
    pub fn draft(
        &self,
        to: impl Into<AddressInput>,
        from: impl Into<AddressInput>,
        subject: &str,
        body: &str,
        attachments: impl Into<AttachmentPaths>,
    ) -> Result<Receipt<Draft>> {
        let composed = self.composer.compose(to, from, subject, body, attachments)?;
        let draft = self.transport.create_draft(&composed.encoded)?;
        info!("Draft created: {}", draft.id);
        Ok(receipt(draft, composed))
    }

    pub fn send_draft(&self, draft_id: &str) -> Result<SentMessage> {
        let sent = self.transport.send_draft(draft_id)?;
        info!("Draft {draft_id} sent as {}", sent.id);
        Ok(sent)
    }

    // Listing

    /// Messages matching a structured query, up to its `max_results` or the
    /// configured default
    pub fn list_messages(&self, query: &MailboxQuery) -> Result<Vec<MessageRef>> {
        let max = query.max_results.unwrap_or(self.settings.default_max_results);
        self.collect(ListRequest::new(max).with_query(query.build()), max)
    }

    /// Messages matching a raw Gmail search string
    pub fn search(&self, raw_query: &str, max_results: Option<usize>) -> Result<Vec<MessageRef>> {
        let max = max_results.unwrap_or(self.settings.default_max_results);
        self.collect(ListRequest::new(max).with_query(raw_query), max)
    }

    /// Server estimate of messages matching a query
    pub fn count_messages(&self, query: &MailboxQuery) -> Result<u32> {
        count_matching(
            self.transport.as_ref(),
            ListRequest::new(1).with_query(query.build()),
        )
    }

    /// Newest messages carrying every label in `labels`, one page only
    pub fn latest_messages(
        &self,
        max_results: usize,
        labels: &[String],
    ) -> Result<Vec<MessageRef>> {
        let request = ListRequest::new(max_results).with_label_ids(labels.to_vec());
        let response = self.transport.list_messages(&request)?;
        let mut messages = response.messages.unwrap_or_default();
        messages.truncate(max_results);
        Ok(messages)
    }

    pub fn unread_messages(
        &self,
        max_results: usize,
        labels: &[String],
    ) -> Result<Vec<MessageRef>> {
        let query = MailboxQuery::new()
            .unread_only(true)
            .labels(labels.iter().cloned())
            .max_results(max_results);
        self.list_messages(&query)
    }

    /// Messages from `sender` received in the last `days_back` days
    /// (configured default when `None`)
    pub fn recent_from_sender(
        &self,
        sender: &str,
        max_results: usize,
        days_back: Option<u32>,
    ) -> Result<Vec<MessageRef>> {
        let days = days_back.unwrap_or(self.settings.recent_days);
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        let query = MailboxQuery::new()
            .from(sender)
            .after(since)
            .max_results(max_results);
        self.list_messages(&query)
    }

    pub fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        max_results: usize,
        labels: &[String],
    ) -> Result<Vec<MessageRef>> {
        let query = MailboxQuery::new()
            .date_range(DateRange::between(start, end))
            .labels(labels.iter().cloned())
            .max_results(max_results);
        self.list_messages(&query)
    }

    fn collect(&self, request: ListRequest, max: usize) -> Result<Vec<MessageRef>> {
        list_paged(self.transport.as_ref(), request, max).collect()
    }

    // Reading

    pub fn get_message(&self, id: &MessageId, format: MessageFormat) -> Result<GmailMessage> {
        Ok(self.transport.get_message(id, format)?)
    }

    /// Decoded body text; HTML is returned only when `prefer_html` is set and
    /// an HTML part exists
    pub fn message_body(&self, id: &MessageId, prefer_html: bool) -> Result<Option<String>> {
        let message = self.get_message(id, MessageFormat::Full)?;
        Ok(message
            .payload
            .as_ref()
            .and_then(|payload| normalize::extract_body(payload, prefer_html)))
    }

    pub fn message_headers(
        &self,
        id: &MessageId,
        names: Option<&[&str]>,
    ) -> Result<BTreeMap<String, String>> {
        let message = self.get_message(id, MessageFormat::Metadata)?;
        Ok(normalize::message_headers(&message, names))
    }

    pub fn message_snippet(&self, id: &MessageId) -> Result<String> {
        let message = self.get_message(id, MessageFormat::Minimal)?;
        Ok(normalize::snippet(&message))
    }

    /// Parsed `Date` header
    pub fn message_date(&self, id: &MessageId) -> Result<Option<DateTime<FixedOffset>>> {
        let message = self.get_message(id, MessageFormat::Metadata)?;
        Ok(normalize::message_date(&message))
    }

    pub fn sender_info(&self, id: &MessageId) -> Result<Option<EmailAddress>> {
        let message = self.get_message(id, MessageFormat::Metadata)?;
        Ok(normalize::sender(&message))
    }

    pub fn recipients_info(&self, id: &MessageId) -> Result<Recipients> {
        let message = self.get_message(id, MessageFormat::Metadata)?;
        Ok(normalize::recipients(&message))
    }

    pub fn thread_messages(
        &self,
        thread_id: &ThreadId,
        format: MessageFormat,
    ) -> Result<Vec<GmailMessage>> {
        Ok(self.transport.get_thread(thread_id, format)?)
    }

    /// Fetch every named attachment of a message
    pub fn download_attachments(&self, id: &MessageId) -> Result<Vec<DownloadedAttachment>> {
        let message = self.get_message(id, MessageFormat::Full)?;
        let Some(payload) = message.payload.as_ref() else {
            return Ok(Vec::new());
        };

        let mut downloaded = Vec::new();
        for part in normalize::attachment_parts(payload) {
            let data = match (&part.attachment_id, &part.data) {
                (Some(attachment_id), _) => self.transport.get_attachment(id, attachment_id)?,
                (None, Some(inline)) => decode_base64(inline).map_err(|e| {
                    MailError::Transport(anyhow::anyhow!(
                        "inline attachment {} is not valid base64: {e}",
                        part.filename
                    ))
                })?,
                (None, None) => continue,
            };
            log::debug!("Downloaded attachment {} ({} bytes)", part.filename, data.len());
            downloaded.push(DownloadedAttachment {
                filename: part.filename,
                mime_type: part.mime_type,
                data,
            });
        }
        Ok(downloaded)
    }

    // Labels

    pub fn list_labels(&self) -> Result<Vec<Label>> {
        let mut labels = self.transport.list_labels()?;
        labels.sort_by(|a, b| {
            crate::models::label_sort_order(a.id.as_str())
                .cmp(&crate::models::label_sort_order(b.id.as_str()))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(labels)
    }

    pub fn create_label(&self, name: &str, color: Option<LabelColor>) -> Result<Label> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MailError::Composition("label name is empty".to_string()));
        }
        let label = self.transport.create_label(name, color)?;
        info!("Label created: {} ({})", label.name, label.id);
        Ok(label)
    }

    /// Label ID for a display name (case-insensitive)
    pub fn label_id_by_name(&self, name: &str) -> Result<Option<LabelId>> {
        Ok(self.transport.resolve_label_id(name)?)
    }

    pub fn mark_read(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.mark_read(id)
    }

    pub fn mark_unread(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.mark_unread(id)
    }

    pub fn star(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.star(id)
    }

    pub fn unstar(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.unstar(id)
    }

    pub fn archive(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.archive(id)
    }

    pub fn unarchive(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.unarchive(id)
    }

    pub fn trash(&self, id: &MessageId) -> Result<LabelSet> {
        self.actions.trash(id)
    }

    pub fn move_to_label(
        &self,
        id: &MessageId,
        label: &str,
        remove_from_inbox: bool,
    ) -> Result<LabelSet> {
        self.actions.move_to_label(id, label, remove_from_inbox)
    }

    pub fn modify_labels(&self, id: &MessageId, delta: &LabelDelta) -> Result<LabelSet> {
        self.actions.modify(id, delta)
    }

    pub fn batch_modify(&self, ids: &[MessageId], delta: &LabelDelta) -> Result<()> {
        self.actions.apply_batch(ids, delta)
    }

    // Processing

    /// Run `processor` over unread messages; see
    /// [`ActionHandler::process_unread`]
    pub fn process_unread(
        &self,
        processor: &mut dyn MessageProcessor,
        mark_processed: bool,
        labels: &[String],
    ) -> Result<usize> {
        self.actions.process_unread(
            processor,
            mark_processed,
            labels,
            self.settings.default_max_results,
        )
    }

    /// Permanently delete a message, bypassing trash
    pub fn delete_message(&self, id: &MessageId) -> Result<()> {
        self.transport.delete_message(id)?;
        info!("Message {id} deleted");
        Ok(())
    }

    /// Push notifications to a Pub/Sub topic; watches `INBOX` when `labels`
    /// is empty
    pub fn watch(&self, topic: &str, labels: &[String]) -> Result<WatchResponse> {
        let labels = if labels.is_empty() {
            vec![LabelId::INBOX.to_string()]
        } else {
            labels.to_vec()
        };
        Ok(self.transport.watch(topic, &labels)?)
    }

    pub fn stop_watch(&self) -> Result<()> {
        Ok(self.transport.stop_watch()?)
    }

    /// Parse a raw Gmail search string into a structured query
    pub fn parse_query(&self, raw: &str) -> MailboxQuery {
        crate::query::parse_query(raw)
    }
}

fn receipt<T>(record: T, composed: ComposedMessage) -> Receipt<T> {
    Receipt {
        record,
        attachment_count: composed.attachment_count,
        skipped: composed.skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InMemoryTransport, SeedMessage};

    fn mailbox() -> (Arc<InMemoryTransport>, Mailbox) {
        let transport = Arc::new(InMemoryTransport::new());
        let mailbox = Mailbox::new(transport.clone(), MailSettings::default());
        (transport, mailbox)
    }

    #[test]
    fn test_send_without_attachments() {
        let (transport, mailbox) = mailbox();
        let receipt = mailbox
            .send("bob@example.com", "me@example.com", "Hi", "Hello Bob", None::<&str>)
            .unwrap();
        assert_eq!(receipt.attachment_count, 0);
        assert!(receipt.skipped.is_empty());
        assert_eq!(transport.sent_messages().len(), 1);

        let id = MessageId::new(receipt.record.id);
        assert_eq!(mailbox.message_body(&id, false).unwrap().as_deref(), Some("Hello Bob"));
        assert_eq!(mailbox.sender_info(&id).unwrap().unwrap().email, "me@example.com");
    }

    #[test]
    fn test_send_with_missing_attachment_still_sends() {
        let (_, mailbox) = mailbox();
        let receipt = mailbox
            .send("bob@example.com", "me@example.com", "Hi", "body", "/nonexistent/file.pdf")
            .unwrap();
        assert_eq!(receipt.attachment_count, 0);
        assert_eq!(receipt.skipped.len(), 1);
        assert!(matches!(receipt.skipped[0], MailError::AttachmentUnavailable { .. }));
    }

    #[test]
    fn test_send_without_recipient_fails_before_transport() {
        let (transport, mailbox) = mailbox();
        let err = mailbox
            .send("", "me@example.com", "Hi", "body", None::<&str>)
            .unwrap_err();
        assert!(matches!(err, MailError::Composition(_)));
        assert!(transport.sent_messages().is_empty());
    }

    #[test]
    fn test_list_uses_default_max() {
        let (transport, mailbox) = mailbox();
        for i in 0..3 {
            transport.add_text_message("a@example.com", &format!("s{i}"), "b", &["INBOX"]);
        }
        let refs = mailbox.list_messages(&MailboxQuery::new().label("INBOX")).unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(transport.last_list_request().unwrap().query.as_deref(), Some("label:INBOX"));
    }

    #[test]
    fn test_latest_is_single_page() {
        let (transport, mailbox) = mailbox();
        for i in 0..6 {
            transport.add_text_message("a@example.com", &format!("s{i}"), "b", &["INBOX"]);
        }
        transport.set_page_size(4);
        let refs = mailbox.latest_messages(10, &["INBOX".to_string()]).unwrap();
        assert_eq!(refs.len(), 4);
        let request = transport.last_list_request().unwrap();
        assert!(request.query.is_none());
        assert_eq!(request.label_ids, vec!["INBOX"]);
    }

    #[test]
    fn test_recent_from_sender_window() {
        let (transport, mailbox) = mailbox();
        let recent = transport.add_message(
            SeedMessage::new("alice@example.com", "new", "b")
                .at(Utc::now() - chrono::Duration::days(2)),
        );
        transport.add_message(
            SeedMessage::new("alice@example.com", "old", "b")
                .at(Utc::now() - chrono::Duration::days(90)),
        );
        transport.add_text_message("bob@example.com", "other", "b", &[]);

        let refs = mailbox.recent_from_sender("alice@example.com", 10, None).unwrap();
        assert_eq!(refs.iter().map(MessageRef::message_id).collect::<Vec<_>>(), vec![recent]);
    }

    #[test]
    fn test_watch_defaults_to_inbox() {
        let (transport, mailbox) = mailbox();
        mailbox.watch("projects/p/topics/mail", &[]).unwrap();
        assert_eq!(transport.watching().as_deref(), Some("projects/p/topics/mail"));
        mailbox.stop_watch().unwrap();
        assert!(transport.watching().is_none());
    }

    #[test]
    fn test_labels_sorted_system_first() {
        let (_, mailbox) = mailbox();
        mailbox.create_label("alpha", None).unwrap();
        let labels = mailbox.list_labels().unwrap();
        assert_eq!(labels[0].id.as_str(), "INBOX");
        assert_eq!(labels.last().unwrap().name, "alpha");
        assert!(mailbox.create_label("  ", None).is_err());
    }
}

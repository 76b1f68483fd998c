//! Action handler for label mutations
//!
//! Turns named transitions into label deltas and sends them to the
//! transport. The server is the source of truth: the label set returned
//! after a change is the one the transport reports.

use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

use super::transitions::Transition;
use crate::error::{MailError, Result};
use crate::gmail::api::GmailMessage;
use crate::models::{LabelDelta, LabelId, LabelSet, MessageFormat, MessageId};
use crate::query::{MailboxQuery, list_paged};
use crate::transport::{ListRequest, MailTransport};

/// Caller-supplied handling for each unread message
pub trait MessageProcessor {
    fn process(&mut self, message: &GmailMessage);
}

impl<F: FnMut(&GmailMessage)> MessageProcessor for F {
    fn process(&mut self, message: &GmailMessage) {
        (*self)(message)
    }
}

/// Handler for label-based actions like archive, star, read/unread
pub struct ActionHandler {
    transport: Arc<dyn MailTransport>,
}

impl ActionHandler {
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Apply a named transition to one message
    pub fn apply(&self, id: &MessageId, transition: &Transition) -> Result<LabelSet> {
        info!("{transition}: message {id}");
        self.modify(id, &transition.delta()?)
    }

    /// Apply an arbitrary delta to one message, returning its new labels
    pub fn modify(&self, id: &MessageId, delta: &LabelDelta) -> Result<LabelSet> {
        if delta.is_empty() {
            debug!("Empty label delta for message {id}, nothing to do");
            let message = self.transport.get_message(id, MessageFormat::Minimal)?;
            return Ok(message.label_set());
        }
        let updated = self.transport.modify_labels(id, delta)?;
        Ok(updated.label_set())
    }

    /// Apply one delta to many messages in a single request
    pub fn apply_batch(&self, ids: &[MessageId], delta: &LabelDelta) -> Result<()> {
        if ids.is_empty() || delta.is_empty() {
            return Ok(());
        }
        info!(
            "Modifying labels on {} messages (+{:?} -{:?})",
            ids.len(),
            delta.add_ids(),
            delta.remove_ids()
        );
        self.transport.batch_modify_labels(ids, delta)?;
        Ok(())
    }

    pub fn mark_read(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::MarkRead)
    }

    pub fn mark_unread(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::MarkUnread)
    }

    pub fn star(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::Star)
    }

    pub fn unstar(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::Unstar)
    }

    /// Remove from the inbox
    pub fn archive(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::Archive)
    }

    pub fn unarchive(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::Unarchive)
    }

    pub fn trash(&self, id: &MessageId) -> Result<LabelSet> {
        self.apply(id, &Transition::Trash)
    }

    /// Add a label given by ID or display name, optionally leaving the inbox
    pub fn move_to_label(
        &self,
        id: &MessageId,
        label: &str,
        remove_from_inbox: bool,
    ) -> Result<LabelSet> {
        let label = self.resolve_label(label)?;
        self.apply(
            id,
            &Transition::MoveTo {
                label,
                remove_from_inbox,
            },
        )
    }

    /// Resolve a label ID or a case-insensitive display name
    pub fn resolve_label(&self, label: &str) -> Result<LabelId> {
        let labels = self.transport.list_labels()?;
        if let Some(found) = labels.iter().find(|l| l.id.as_str() == label) {
            return Ok(found.id.clone());
        }
        labels
            .into_iter()
            .find(|l| l.name.eq_ignore_ascii_case(label))
            .map(|l| l.id)
            .ok_or_else(|| MailError::NotFound(format!("label {label}")))
    }

    /// Hand every unread message to `processor` once, in listing order.
    ///
    /// Returns the number of messages processed.
    pub fn process_unread(
        &self,
        processor: &mut dyn MessageProcessor,
        mark_processed: bool,
        labels: &[String],
        max_results: usize,
    ) -> Result<usize> {
        let query = MailboxQuery::new().unread_only(true).labels(labels.iter().cloned());
        let request = ListRequest::new(max_results).with_query(query.build());

        // Collect first; marking read changes the result set being paged.
        let refs = list_paged(self.transport.as_ref(), request, max_results)
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for message_ref in refs {
            let id = message_ref.message_id();
            if !seen.insert(id.clone()) {
                continue;
            }
            let message = self.transport.get_message(&id, MessageFormat::Full)?;
            processor.process(&message);
            if mark_processed {
                self.mark_read(&id)?;
            }
        }

        info!("Processed {} unread messages", seen.len());
        Ok(seen.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;

    fn handler() -> (Arc<InMemoryTransport>, ActionHandler) {
        let transport = Arc::new(InMemoryTransport::new());
        let handler = ActionHandler::new(transport.clone());
        (transport, handler)
    }

    #[test]
    fn test_named_transitions() {
        let (transport, handler) = handler();
        let id = transport.add_text_message("a@example.com", "s", "b", &["INBOX", "UNREAD"]);

        assert!(!handler.mark_read(&id).unwrap().is_unread());
        assert!(handler.star(&id).unwrap().is_starred());
        assert!(handler.archive(&id).unwrap().is_archived());
        assert!(handler.unarchive(&id).unwrap().is_in_inbox());
        assert!(handler.mark_unread(&id).unwrap().is_unread());
        assert!(!handler.unstar(&id).unwrap().is_starred());
        assert!(handler.trash(&id).unwrap().is_trashed());
    }

    #[test]
    fn test_move_to_label_by_name() {
        let (transport, handler) = handler();
        let label = transport.create_label("Projects", None).unwrap();
        let id = transport.add_text_message("a@example.com", "s", "b", &["INBOX"]);

        let labels = handler.move_to_label(&id, "projects", true).unwrap();
        assert!(labels.contains(label.id.as_str()));
        assert!(!labels.is_in_inbox());

        let err = handler.move_to_label(&id, "Nope", false).unwrap_err();
        assert!(matches!(err, MailError::NotFound(_)));
    }

    #[test]
    fn test_missing_message_is_not_found() {
        let (_, handler) = handler();
        let err = handler.star(&MessageId::new("ghost")).unwrap_err();
        assert!(matches!(err, MailError::NotFound(_)));
    }

    #[test]
    fn test_process_unread_marks_each_once() {
        let (transport, handler) = handler();
        for i in 0..5 {
            let subject = format!("u{i}");
            transport.add_text_message("a@example.com", &subject, "b", &["INBOX", "UNREAD"]);
        }
        transport.add_text_message("a@example.com", "read", "b", &["INBOX"]);
        transport.set_page_size(2);

        let mut subjects = Vec::new();
        let mut record = |m: &GmailMessage| {
            subjects.push(crate::gmail::normalize::message_header(m, "Subject").unwrap_or_default())
        };
        let count = handler
            .process_unread(&mut record, true, &["INBOX".to_string()], 100)
            .unwrap();

        assert_eq!(count, 5);
        assert_eq!(subjects, vec!["u0", "u1", "u2", "u3", "u4"]);
        for id in transport.message_ids() {
            assert!(!transport.labels_of(&id).unwrap().is_unread());
        }
    }

    #[test]
    fn test_process_unread_without_marking() {
        let (transport, handler) = handler();
        let id = transport.add_text_message("a@example.com", "u", "b", &["UNREAD"]);
        let mut calls = 0;
        let mut count_calls = |_: &GmailMessage| calls += 1;
        handler.process_unread(&mut count_calls, false, &[], 10).unwrap();
        assert_eq!(calls, 1);
        assert!(transport.labels_of(&id).unwrap().is_unread());
    }
}

//! Labels and label sets
//!
//! A message's state (read/unread, starred, archived, trashed) is nothing
//! more than membership of well-known label IDs in its [`LabelSet`]. Changes
//! are expressed as a [`LabelDelta`] and applied by
//! [`crate::actions::apply_delta`].

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{MailError, Result};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the well-known system labels
    pub fn is_system(&self) -> bool {
        Self::SYSTEM.contains(&self.as_str())
    }

    // Well-known Gmail system labels
    pub const UNREAD: &'static str = "UNREAD";
    pub const INBOX: &'static str = "INBOX";
    pub const STARRED: &'static str = "STARRED";
    pub const SENT: &'static str = "SENT";
    pub const TRASH: &'static str = "TRASH";
    pub const SPAM: &'static str = "SPAM";
    pub const IMPORTANT: &'static str = "IMPORTANT";
    pub const DRAFT: &'static str = "DRAFT";

    pub const SYSTEM: [&'static str; 8] = [
        Self::UNREAD,
        Self::INBOX,
        Self::STARRED,
        Self::SENT,
        Self::TRASH,
        Self::SPAM,
        Self::IMPORTANT,
        Self::DRAFT,
    ];
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&String> for LabelId {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl Borrow<str> for LabelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Background/text colour pair for a user label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    pub text_color: String,
    pub background_color: String,
}

/// A mail label (system or user-defined)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
    /// Whether this is a system label
    pub is_system: bool,
    /// Number of messages with this label
    pub message_count: u32,
    /// Number of unread messages
    pub unread_count: u32,
    /// Colour, user labels only
    pub color: Option<LabelColor>,
}

impl Label {
    /// Create a user label
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_system: false,
            message_count: 0,
            unread_count: 0,
            color: None,
        }
    }

    /// Create a system label
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            is_system: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_message_count(mut self, count: u32) -> Self {
        self.message_count = count;
        self
    }

    pub fn with_unread_count(mut self, count: u32) -> Self {
        self.unread_count = count;
        self
    }

    pub fn with_color(mut self, color: LabelColor) -> Self {
        self.color = Some(color);
        self
    }
}

/// Display order for labels: system labels first, user labels after
pub fn label_sort_order(label_id: &str) -> u32 {
    match label_id {
        LabelId::INBOX => 0,
        LabelId::STARRED => 1,
        LabelId::IMPORTANT => 2,
        LabelId::SENT => 3,
        LabelId::DRAFT => 4,
        LabelId::UNREAD => 5,
        LabelId::SPAM => 6,
        LabelId::TRASH => 7,
        _ => 100,
    }
}

/// The set of labels attached to one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeSet<LabelId>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Add a label; adding a present label is a no-op
    pub fn insert(&mut self, label: impl Into<LabelId>) {
        self.0.insert(label.into());
    }

    /// Remove a label; removing an absent label is a no-op
    pub fn remove(&mut self, label: &str) {
        self.0.remove(label);
    }

    pub fn is_unread(&self) -> bool {
        self.contains(LabelId::UNREAD)
    }

    pub fn is_starred(&self) -> bool {
        self.contains(LabelId::STARRED)
    }

    pub fn is_in_inbox(&self) -> bool {
        self.contains(LabelId::INBOX)
    }

    /// Archived means "not in the inbox"
    pub fn is_archived(&self) -> bool {
        !self.is_in_inbox()
    }

    pub fn is_trashed(&self) -> bool {
        self.contains(LabelId::TRASH)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label IDs as plain strings (wire format)
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|l| l.0.clone()).collect()
    }
}

impl<T: Into<LabelId>> FromIterator<T> for LabelSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<LabelId>> Extend<T> for LabelSet {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

/// Labels to add and remove in one state transition.
///
/// A label may not appear on both sides; construction rejects that with
/// [`MailError::StateConflict`], so every delta in circulation is
/// unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    add: BTreeSet<LabelId>,
    remove: BTreeSet<LabelId>,
}

impl LabelDelta {
    /// Build a delta, rejecting overlapping add/remove sets
    pub fn new<A, R>(add: A, remove: R) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: Into<LabelId>,
        R: IntoIterator,
        R::Item: Into<LabelId>,
    {
        let add: BTreeSet<LabelId> = add.into_iter().map(Into::into).collect();
        let remove: BTreeSet<LabelId> = remove.into_iter().map(Into::into).collect();

        if let Some(conflict) = add.intersection(&remove).next() {
            return Err(MailError::StateConflict(conflict.to_string()));
        }

        Ok(Self { add, remove })
    }

    /// Delta adding a single label
    pub fn adding(label: impl Into<LabelId>) -> Self {
        Self {
            add: BTreeSet::from([label.into()]),
            remove: BTreeSet::new(),
        }
    }

    /// Delta removing a single label
    pub fn removing(label: impl Into<LabelId>) -> Self {
        Self {
            add: BTreeSet::new(),
            remove: BTreeSet::from([label.into()]),
        }
    }

    pub fn to_add(&self) -> &BTreeSet<LabelId> {
        &self.add
    }

    pub fn to_remove(&self) -> &BTreeSet<LabelId> {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// IDs to add, in wire format
    pub fn add_ids(&self) -> Vec<String> {
        self.add.iter().map(|l| l.0.clone()).collect()
    }

    /// IDs to remove, in wire format
    pub fn remove_ids(&self) -> Vec<String> {
        self.remove.iter().map(|l| l.0.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_state_predicates() {
        let set: LabelSet = ["INBOX", "UNREAD"].into_iter().collect();
        assert!(set.is_unread());
        assert!(set.is_in_inbox());
        assert!(!set.is_archived());
        assert!(!set.is_starred());

        let archived: LabelSet = ["STARRED"].into_iter().collect();
        assert!(archived.is_archived());
        assert!(archived.is_starred());
    }

    #[test]
    fn test_insert_and_remove_are_idempotent() {
        let mut set = LabelSet::new();
        set.insert("STARRED");
        set.insert("STARRED");
        assert_eq!(set.len(), 1);

        set.remove("UNREAD");
        set.remove("STARRED");
        set.remove("STARRED");
        assert!(set.is_empty());
    }

    #[test]
    fn test_delta_rejects_overlap() {
        let err = LabelDelta::new(["UNREAD", "STARRED"], ["UNREAD"]).unwrap_err();
        assert!(matches!(err, MailError::StateConflict(ref l) if l == "UNREAD"));
    }

    #[test]
    fn test_delta_wire_ids_are_sorted_and_deduplicated() {
        let delta = LabelDelta::new(["STARRED", "IMPORTANT", "STARRED"], ["INBOX"]).unwrap();
        assert_eq!(delta.add_ids(), vec!["IMPORTANT", "STARRED"]);
        assert_eq!(delta.remove_ids(), vec!["INBOX"]);
        assert!(!delta.is_empty());
        assert!(LabelDelta::default().is_empty());
    }

    #[test]
    fn test_system_labels() {
        assert!(LabelId::new("TRASH").is_system());
        assert!(!LabelId::new("Label_42").is_system());
    }

    #[test]
    fn test_sort_order_puts_user_labels_last() {
        assert!(label_sort_order("INBOX") < label_sort_order("TRASH"));
        assert_eq!(label_sort_order("Label_7"), 100);
    }

    #[test]
    fn test_label_set_serializes_as_list() {
        let set: LabelSet = ["UNREAD", "INBOX"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["INBOX","UNREAD"]"#);
    }
}

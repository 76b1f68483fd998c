//! Label state transitions
//!
//! Message state is nothing but label membership: unread means `UNREAD` is
//! present, archived means `INBOX` is absent. Every named transition is a
//! [`LabelDelta`] applied through [`apply_delta`].

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::models::{LabelDelta, LabelId, LabelSet, MessageId};

/// `(current ∪ add) − remove`
pub fn apply_delta(current: &LabelSet, delta: &LabelDelta) -> LabelSet {
    let mut next = current.clone();
    next.extend(delta.to_add().iter().cloned());
    for label in delta.to_remove() {
        next.remove(label.as_str());
    }
    next
}

/// Apply one delta uniformly to every message's labels
pub fn apply_delta_batch(
    current: &BTreeMap<MessageId, LabelSet>,
    delta: &LabelDelta,
) -> BTreeMap<MessageId, LabelSet> {
    current
        .iter()
        .map(|(id, labels)| (id.clone(), apply_delta(labels, delta)))
        .collect()
}

/// Named state changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    MarkRead,
    MarkUnread,
    Star,
    Unstar,
    Archive,
    Unarchive,
    /// Move to trash; Gmail drops the inbox label at the same time
    Trash,
    MoveTo {
        label: LabelId,
        remove_from_inbox: bool,
    },
}

impl Transition {
    pub fn delta(&self) -> Result<LabelDelta> {
        match self {
            Transition::MarkRead => Ok(LabelDelta::removing(LabelId::UNREAD)),
            Transition::MarkUnread => Ok(LabelDelta::adding(LabelId::UNREAD)),
            Transition::Star => Ok(LabelDelta::adding(LabelId::STARRED)),
            Transition::Unstar => Ok(LabelDelta::removing(LabelId::STARRED)),
            Transition::Archive => Ok(LabelDelta::removing(LabelId::INBOX)),
            Transition::Unarchive => Ok(LabelDelta::adding(LabelId::INBOX)),
            Transition::Trash => LabelDelta::new([LabelId::TRASH], [LabelId::INBOX]),
            Transition::MoveTo {
                label,
                remove_from_inbox,
            } => {
                let remove: &[&str] = if *remove_from_inbox { &[LabelId::INBOX] } else { &[] };
                LabelDelta::new([label.clone()], remove.iter().copied())
            }
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::MarkRead => f.write_str("mark read"),
            Transition::MarkUnread => f.write_str("mark unread"),
            Transition::Star => f.write_str("star"),
            Transition::Unstar => f.write_str("unstar"),
            Transition::Archive => f.write_str("archive"),
            Transition::Unarchive => f.write_str("unarchive"),
            Transition::Trash => f.write_str("trash"),
            Transition::MoveTo { label, .. } => write!(f, "move to {label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;

    fn set(labels: &[&str]) -> LabelSet {
        labels.iter().copied().collect()
    }

    #[test]
    fn test_add_then_remove() {
        let delta = LabelDelta::new(["STARRED", "Label_1"], ["INBOX", "SPAM"]).unwrap();
        let next = apply_delta(&set(&["INBOX", "UNREAD"]), &delta);
        assert_eq!(next, set(&["UNREAD", "STARRED", "Label_1"]));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let start = set(&["INBOX", "UNREAD", "Label_7"]);
        for transition in [
            Transition::MarkRead,
            Transition::Star,
            Transition::Archive,
            Transition::Trash,
            Transition::MoveTo {
                label: LabelId::new("Label_9"),
                remove_from_inbox: true,
            },
        ] {
            let delta = transition.delta().unwrap();
            let once = apply_delta(&start, &delta);
            assert_eq!(apply_delta(&once, &delta), once, "{transition}");
        }
    }

    #[test]
    fn test_read_then_unread_restores_unread() {
        let start = set(&["INBOX", "UNREAD"]);
        let read = apply_delta(&start, &Transition::MarkRead.delta().unwrap());
        assert!(!read.is_unread());
        let unread = apply_delta(&read, &Transition::MarkUnread.delta().unwrap());
        assert_eq!(unread, start);
    }

    #[test]
    fn test_removing_absent_label_is_noop() {
        let start = set(&["INBOX"]);
        assert_eq!(apply_delta(&start, &Transition::Unstar.delta().unwrap()), start);
    }

    #[test]
    fn test_archive_and_trash() {
        let archived = apply_delta(&set(&["INBOX"]), &Transition::Archive.delta().unwrap());
        assert!(archived.is_archived());

        let trashed = apply_delta(&set(&["INBOX"]), &Transition::Trash.delta().unwrap());
        assert!(trashed.is_trashed());
        assert!(!trashed.is_in_inbox());
    }

    #[test]
    fn test_move_to_inbox_while_removing_inbox_conflicts() {
        let err = Transition::MoveTo {
            label: LabelId::new(LabelId::INBOX),
            remove_from_inbox: true,
        }
        .delta()
        .unwrap_err();
        assert!(matches!(err, MailError::StateConflict(_)));
    }

    #[test]
    fn test_batch_applies_uniformly() {
        let current = BTreeMap::from([
            (MessageId::new("a"), set(&["INBOX", "UNREAD"])),
            (MessageId::new("b"), set(&["UNREAD", "Label_2"])),
        ]);
        let next = apply_delta_batch(&current, &Transition::MarkRead.delta().unwrap());
        assert_eq!(next[&MessageId::new("a")], set(&["INBOX"]));
        assert_eq!(next[&MessageId::new("b")], set(&["Label_2"]));
    }
}

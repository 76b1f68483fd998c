//! Mail crate - Gmail bot core
//!
//! This crate provides:
//! - Message composition with attachments and MIME encoding
//! - Address header parsing
//! - The label state model (read/unread, starred, archived, trashed)
//! - Gmail search query building, parsing and pagination
//! - A transport boundary with a Gmail REST client and an in-memory mailbox
//! - The [`Mailbox`] facade tying them together
//!
//! The core is synchronous and free of global state; the transport is
//! constructed by the caller and injected into [`Mailbox`].

pub mod actions;
pub mod compose;
pub mod config;
pub mod error;
pub mod gmail;
pub mod mailbox;
pub mod models;
pub mod query;
pub mod transport;

pub use actions::{ActionHandler, MessageProcessor, Transition, apply_delta, apply_delta_batch};
pub use compose::{
    AttachmentPaths, AttachmentResolver, ComposedMessage, EncodedMessage, MessageComposer,
    OutboundMessage,
};
pub use config::{GmailCredentials, MailSettings};
pub use error::{MailError, Result};
pub use gmail::{GmailAuth, GmailClient};
pub use mailbox::{DownloadedAttachment, Mailbox, Receipt};
pub use models::{
    EmailAddress, Label, LabelDelta, LabelId, LabelSet, MessageFormat, MessageId, Recipients,
    ThreadId, parse_address_list,
};
pub use query::{DateRange, MailboxQuery, build_query, count_matching, list_paged, parse_query};
pub use transport::{InMemoryTransport, ListRequest, MailTransport, SeedMessage};

//! Outgoing message composition
//!
//! [`MessageComposer`] resolves attachment paths through
//! [`AttachmentResolver`], assembles an [`OutboundMessage`] and encodes it
//! with [`mime::encode`] into the URL-safe `raw` form Gmail expects.

mod attachment;
mod composer;
pub mod encoding;
mod message;
pub mod mime;

pub use attachment::{
    AttachmentResolver, FileSource, FsFileSource, ResolvedAttachment, guess_content_type,
};
pub use composer::{AttachmentPaths, ComposedMessage, MessageComposer};
pub use message::{
    AddressInput, Attachment, EncodedMessage, OutboundMessage, OutboundMessageBuilder,
};
pub use mime::{ContentType, DecodedMessage};

//! Message composition: resolve attachments, build, encode

use std::path::{Path, PathBuf};

use super::attachment::{AttachmentResolver, FileSource, FsFileSource};
use super::message::{AddressInput, EncodedMessage, OutboundMessage};
use super::mime;
use crate::error::{MailError, Result};

/// Zero, one or many attachment paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentPaths(pub Vec<PathBuf>);

impl AttachmentPaths {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

impl From<&str> for AttachmentPaths {
    fn from(path: &str) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<String> for AttachmentPaths {
    fn from(path: String) -> Self {
        Self(vec![PathBuf::from(path)])
    }
}

impl From<&Path> for AttachmentPaths {
    fn from(path: &Path) -> Self {
        Self(vec![path.to_path_buf()])
    }
}

impl From<PathBuf> for AttachmentPaths {
    fn from(path: PathBuf) -> Self {
        Self(vec![path])
    }
}

impl<T: Into<PathBuf>> From<Vec<T>> for AttachmentPaths {
    fn from(paths: Vec<T>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for AttachmentPaths {
    fn from(paths: &[&str]) -> Self {
        Self(paths.iter().map(PathBuf::from).collect())
    }
}

impl<T: Into<PathBuf>> From<Option<T>> for AttachmentPaths {
    fn from(path: Option<T>) -> Self {
        Self(path.into_iter().map(Into::into).collect())
    }
}

/// Output of [`MessageComposer::compose`]
#[derive(Debug)]
pub struct ComposedMessage {
    pub encoded: EncodedMessage,
    /// Number of attachments embedded
    pub attachment_count: usize,
    /// One [`MailError::AttachmentUnavailable`] per path that was skipped
    pub skipped: Vec<MailError>,
}

impl ComposedMessage {
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Builds transport-ready messages from caller input
#[derive(Debug, Clone, Default)]
pub struct MessageComposer<S = FsFileSource> {
    resolver: AttachmentResolver<S>,
}

impl MessageComposer<FsFileSource> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: FileSource> MessageComposer<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            resolver: AttachmentResolver::with_source(source),
        }
    }

    /// Compose and encode a message.
    ///
    /// Unreadable attachments are skipped and reported in
    /// [`ComposedMessage::skipped`]; missing headers or body fail with
    /// [`MailError::Composition`].
    pub fn compose(
        &self,
        to: impl Into<AddressInput>,
        from: impl Into<AddressInput>,
        subject: &str,
        body: &str,
        attachments: impl Into<AttachmentPaths>,
    ) -> Result<ComposedMessage> {
        let paths = attachments.into();
        let (loaded, skipped) = self.resolver.resolve_all(paths.as_slice());

        for skip in &skipped {
            log::warn!("Skipping attachment: {}", skip);
        }

        let message = OutboundMessage::builder()
            .to(to)
            .from(from)
            .subject(subject)
            .body_text(body)
            .attachments(loaded)
            .build()?;

        let encoded = mime::encode(&message)?;
        log::debug!(
            "Composed message with {} attachment(s), {} skipped",
            message.attachments.len(),
            skipped.len()
        );

        Ok(ComposedMessage {
            encoded,
            attachment_count: message.attachments.len(),
            skipped,
        })
    }
}

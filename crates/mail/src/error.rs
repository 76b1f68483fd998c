//! Error taxonomy for mail operations

use std::path::PathBuf;

/// Result alias used by the composition, label and facade layers
pub type Result<T, E = MailError> = std::result::Result<T, E>;

/// Errors surfaced by the mail core
///
/// `AttachmentUnavailable` and `ParseAmbiguous` are normally absorbed by the
/// caller (skip and continue); they are still typed so the reason can be
/// reported alongside a partial result.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// A well-formed message could not be built
    #[error("cannot compose message: {0}")]
    Composition(String),

    /// An attachment file is missing or unreadable
    #[error("attachment unavailable: {}: {reason}", path.display())]
    AttachmentUnavailable { path: PathBuf, reason: String },

    /// A header value contained no extractable address
    #[error("no email address found in {0:?}")]
    ParseAmbiguous(String),

    /// The transport collaborator failed; never retried here
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    /// A label delta both adds and removes the same label
    #[error("label {0} is both added and removed")]
    StateConflict(String),

    /// A label or message looked up by the caller does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl MailError {
    /// Whether this condition should degrade to a partial result
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MailError::AttachmentUnavailable { .. } | MailError::ParseAmbiguous(_)
        )
    }
}

/// Raised by transports when the server reports a missing resource
#[derive(Debug, thiserror::Error)]
#[error("{0} not found")]
pub struct ResourceNotFound(pub String);

impl From<anyhow::Error> for MailError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ResourceNotFound>() {
            Some(ResourceNotFound(what)) => MailError::NotFound(what.clone()),
            None => MailError::Transport(err),
        }
    }
}

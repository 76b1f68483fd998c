//! Loading attachments from disk

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::message::Attachment;
use super::mime::ContentType;
use crate::error::MailError;

/// Source of attachment bytes
///
/// The composer only ever reads through this trait, so tests can supply
/// files without touching the filesystem.
pub trait FileSource: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads attachments from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSource;

impl FileSource for FsFileSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        // The handle is dropped at the end of this scope
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Guess a content type from the file extension, falling back to
/// `application/octet-stream`
pub fn guess_content_type(path: &Path) -> ContentType {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let (main, sub) = match extension.as_str() {
        "txt" | "text" | "log" => ("text", "plain"),
        "csv" => ("text", "csv"),
        "html" | "htm" => ("text", "html"),
        "md" => ("text", "markdown"),
        "ics" => ("text", "calendar"),
        "pdf" => ("application", "pdf"),
        "json" => ("application", "json"),
        "xml" => ("application", "xml"),
        "zip" => ("application", "zip"),
        "gz" => ("application", "gzip"),
        "doc" => ("application", "msword"),
        "xls" => ("application", "vnd.ms-excel"),
        "docx" => (
            "application",
            "vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        "xlsx" => (
            "application",
            "vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        "pptx" => (
            "application",
            "vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        "png" => ("image", "png"),
        "jpg" | "jpeg" => ("image", "jpeg"),
        "gif" => ("image", "gif"),
        "webp" => ("image", "webp"),
        "svg" => ("image", "svg+xml"),
        "mp3" => ("audio", "mpeg"),
        "wav" => ("audio", "wav"),
        "mp4" => ("video", "mp4"),
        _ => return ContentType::octet_stream(),
    };
    ContentType::new(main, sub)
}

/// Result of resolving one attachment path
#[derive(Debug)]
pub enum ResolvedAttachment {
    Loaded(Attachment),
    /// The path could not be read; holds [`MailError::AttachmentUnavailable`]
    Skipped(MailError),
}

/// Turns attachment paths into [`Attachment`]s
#[derive(Debug, Clone, Default)]
pub struct AttachmentResolver<S = FsFileSource> {
    source: S,
}

impl AttachmentResolver<FsFileSource> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: FileSource> AttachmentResolver<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Read one path. Unreadable paths are reported, not raised.
    pub fn resolve(&self, path: &Path) -> ResolvedAttachment {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                return ResolvedAttachment::Skipped(MailError::AttachmentUnavailable {
                    path: path.to_path_buf(),
                    reason: "path has no file name".to_string(),
                });
            }
        };

        match self.source.read(path) {
            Ok(data) => ResolvedAttachment::Loaded(Attachment {
                filename,
                content_type: guess_content_type(path),
                data,
                source: Some(path.to_path_buf()),
            }),
            Err(e) => ResolvedAttachment::Skipped(MailError::AttachmentUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    /// Read every path in order, splitting loaded files from skipped ones
    pub fn resolve_all(&self, paths: &[PathBuf]) -> (Vec<Attachment>, Vec<MailError>) {
        let mut loaded = Vec::new();
        let mut skipped = Vec::new();
        for path in paths {
            match self.resolve(path) {
                ResolvedAttachment::Loaded(attachment) => loaded.push(attachment),
                ResolvedAttachment::Skipped(error) => skipped.push(error),
            }
        }
        (loaded, skipped)
    }
}

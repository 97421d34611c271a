use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    BadMagic,
    InvalidPrelude(String),
    InvalidNamespaceMetadata(String),
    /// The stream ended before the end-of-archive marker; a partial read
    /// surfaces here rather than silently truncating the restore.
    ShortArchive,
    UnknownNamespaceIndex(u32),
    /// `reader_for` was called on a namespace that is cached in memory
    /// instead of streamed — see [`crate::demux::is_special`].
    NotAStream(String),
    AlreadyOpened(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "archive io error: {e}"),
            ArchiveError::BadMagic => write!(f, "not a restorekit archive (bad magic bytes)"),
            ArchiveError::InvalidPrelude(msg) => write!(f, "invalid archive prelude: {msg}"),
            ArchiveError::InvalidNamespaceMetadata(msg) => {
                write!(f, "invalid namespace metadata block: {msg}")
            }
            ArchiveError::ShortArchive => write!(f, "short archive: stream ended before end marker"),
            ArchiveError::UnknownNamespaceIndex(i) => {
                write!(f, "frame referenced unknown namespace index {i}")
            }
            ArchiveError::NotAStream(ns) => {
                write!(f, "namespace {ns} is cached, not streamed; use cached_documents")
            }
            ArchiveError::AlreadyOpened(ns) => write!(f, "reader for namespace {ns} already opened"),
        }
    }
}

impl std::error::Error for ArchiveError {}

impl From<io::Error> for ArchiveError {
    fn from(e: io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

impl Clone for ArchiveError {
    fn clone(&self) -> Self {
        match self {
            ArchiveError::Io(e) => ArchiveError::Io(io::Error::new(e.kind(), e.to_string())),
            ArchiveError::BadMagic => ArchiveError::BadMagic,
            ArchiveError::InvalidPrelude(s) => ArchiveError::InvalidPrelude(s.clone()),
            ArchiveError::InvalidNamespaceMetadata(s) => ArchiveError::InvalidNamespaceMetadata(s.clone()),
            ArchiveError::ShortArchive => ArchiveError::ShortArchive,
            ArchiveError::UnknownNamespaceIndex(i) => ArchiveError::UnknownNamespaceIndex(*i),
            ArchiveError::NotAStream(s) => ArchiveError::NotAStream(s.clone()),
            ArchiveError::AlreadyOpened(s) => ArchiveError::AlreadyOpened(s.clone()),
        }
    }
}

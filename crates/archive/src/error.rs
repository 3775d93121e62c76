//! crates/archive/src/error.rs
//!
//! Error types for archive operations.

use std::io;

use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur while querying or mutating an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No entry exists at the given path.
    #[error("no entry at '{0}'")]
    NotFound(String),
    /// A content entry was expected but the path resolves to a directory.
    #[error("'{0}' is a directory")]
    NotContent(String),
    /// A directory was expected but the path resolves to a content entry,
    /// or the path does not resolve at all.
    #[error("'{0}' is not a directory")]
    NotDirectory(String),
    /// The target of a mutation already exists.
    #[error("entry at '{0}' already exists")]
    AlreadyExists(String),
    /// The entry name or path is not acceptable for the requested mutation.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// The parent directory has no end marker in the on-disk descriptor
    /// table, so there is no position to splice new records into. Map-group
    /// directories are the usual source: their on-disk form has no marker
    /// pair until a write normalizes them.
    #[error("directory '{0}' has no end marker in the descriptor table")]
    MarkerMissing(String),
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}

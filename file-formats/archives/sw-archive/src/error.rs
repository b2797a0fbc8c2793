//! Error types for archive access

use std::io;
use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive container is corrupted or unreadable
    #[error("Invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Entry not found in archive
    #[error("Entry not found in {archive}: {entry}")]
    EntryNotFound {
        /// Archive that was searched
        archive: String,
        /// Entry path that was requested
        entry: String,
    },
}

impl Error {
    /// Create a new EntryNotFound error
    pub fn entry_not_found<A: Into<String>, E: Into<String>>(archive: A, entry: E) -> Self {
        Error::EntryNotFound {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// Check if this error means the requested entry was absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound { .. })
    }

    /// Check if this error indicates the archive is corrupted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Zip(zip::result::ZipError::InvalidArchive(_))
                | Error::Zip(zip::result::ZipError::UnsupportedArchive(_))
        )
    }
}

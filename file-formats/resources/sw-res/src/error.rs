//! Error types for resource processing

use std::io;
use thiserror::Error;

/// Result type alias for resource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or rewriting a resource
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed format grammar string
    #[error("Invalid format grammar: {0}")]
    GrammarSyntax(String),

    /// Malformed translation file
    #[error("Invalid translation file at line {line}: {message}")]
    TranslationParse {
        /// Zero-based index of the offending line
        line: usize,
        /// What was wrong with it
        message: String,
    },

    /// The record stream ended before the declared record count was reached
    #[error("Unexpected end of resource in record {record} of {count}")]
    UnexpectedEof {
        /// Zero-based index of the record being decoded
        record: u64,
        /// Record count declared in the header
        count: u64,
    },

    /// A substituted text is too long for its length prefix
    #[error("Text of {length} characters does not fit a {width}-byte length in record {record}")]
    LengthOverflow {
        /// Zero-based index of the record being encoded
        record: u64,
        /// Width of the length prefix in bytes
        width: usize,
        /// Character count that was requested
        length: u64,
    },

    /// The resource does not end with a checksum trailer
    #[error("Missing checksum trailer: {0}")]
    MissingTrailer(String),

    /// Processing was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new GrammarSyntax error
    pub fn grammar<S: Into<String>>(msg: S) -> Self {
        Error::GrammarSyntax(msg.into())
    }

    /// Create a new TranslationParse error
    pub fn translation<S: Into<String>>(line: usize, msg: S) -> Self {
        Error::TranslationParse {
            line,
            message: msg.into(),
        }
    }

    /// Check if this error is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error indicates the resource bytes are corrupted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEof { .. } | Error::MissingTrailer(_)
        )
    }
}

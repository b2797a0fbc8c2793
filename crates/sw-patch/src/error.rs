//! Error types for patch runs

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for patch runs
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A unit's format string is malformed; reported before any file is touched
    GrammarSyntax,
    /// A per-language translation file could not be loaded
    TranslationParse,
    /// An archive or file could not be read or written
    ArchiveIo,
    /// A resource's record stream could not be rewritten
    ResourceData,
    /// The run itself could not be carried out
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::GrammarSyntax => "grammar syntax",
            ErrorKind::TranslationParse => "translation parse",
            ErrorKind::ArchiveIo => "archive I/O",
            ErrorKind::ResourceData => "resource data",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors that abort a patch run
///
/// Cancellation is not represented here; a cancelled run completes with
/// [`PatchOutcome::Cancelled`](crate::PatchOutcome::Cancelled).
#[derive(Debug, Error)]
pub enum Error {
    /// The unit's format grammar is malformed
    #[error("Invalid format for {unit}: {source}")]
    GrammarSyntax {
        /// Unit identity (`archive:entry`)
        unit: String,
        /// Parser error
        #[source]
        source: sw_res::Error,
    },

    /// The unit's translation file could not be loaded
    #[error("Cannot load {language} translation {} for {unit}: {source}", path.display())]
    TranslationParse {
        /// Unit identity (`archive:entry`)
        unit: String,
        /// Language being patched
        language: String,
        /// Translation file that failed
        path: PathBuf,
        /// Loader error
        #[source]
        source: sw_res::Error,
    },

    /// Archive access for the unit failed
    #[error("Archive error for {unit} ({language}): {source}")]
    ArchiveIo {
        /// Unit identity (`archive:entry`)
        unit: String,
        /// Language being patched
        language: String,
        /// Archive error
        #[source]
        source: sw_archive::Error,
    },

    /// Rewriting the unit's record stream failed
    #[error("Cannot patch {unit} ({language}): {source}")]
    Resource {
        /// Unit identity (`archive:entry`)
        unit: String,
        /// Language being patched
        language: String,
        /// Codec error
        #[source]
        source: sw_res::Error,
    },

    /// Filesystem access not tied to a single unit failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Filesystem access on behalf of a unit failed
    #[error("I/O error for {unit} ({language}) at {}: {source}", path.display())]
    UnitIo {
        /// Unit identity (`archive:entry`)
        unit: String,
        /// Language being patched
        language: String,
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A descriptor cannot be resolved to a location
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The worker thread could not be started
    #[error("Cannot start patch worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// The worker thread panicked before reporting an outcome
    #[error("Patch worker panicked")]
    WorkerPanicked,
}

impl Error {
    /// Create a new Io error for a path
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a unit to a filesystem error raised while processing it
    ///
    /// Errors that already name a unit are returned unchanged.
    pub fn for_unit(self, unit: &str, language: &str) -> Self {
        match self {
            Error::Io { path, source } => Error::UnitIo {
                unit: unit.to_string(),
                language: language.to_string(),
                path,
                source,
            },
            other => other,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::GrammarSyntax { .. } => ErrorKind::GrammarSyntax,
            Error::TranslationParse { .. } => ErrorKind::TranslationParse,
            Error::ArchiveIo { .. } | Error::UnitIo { .. } | Error::Io { .. } => {
                ErrorKind::ArchiveIo
            }
            Error::Resource { .. } => ErrorKind::ResourceData,
            Error::InvalidDescriptor(_) | Error::WorkerSpawn(_) | Error::WorkerPanicked => {
                ErrorKind::Internal
            }
        }
    }

    /// Identity of the unit that failed, if the error is tied to one
    pub fn unit(&self) -> Option<&str> {
        match self {
            Error::GrammarSyntax { unit, .. }
            | Error::TranslationParse { unit, .. }
            | Error::ArchiveIo { unit, .. }
            | Error::UnitIo { unit, .. }
            | Error::Resource { unit, .. } => Some(unit),
            _ => None,
        }
    }
}

//! Error types for the C3D library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for C3D operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Reader or writer was updated without a filename
    #[error("Filename must be specified.")]
    FilenameNotSpecified,

    /// Writer was updated without an input acquisition
    #[error("No input acquisition to write.")]
    NoInput,

    /// Invalid codec configuration (byte order, storage format, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No codec is able to handle the given file
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Malformed header, parameter section or data section
    #[error("Decode error: {0}")]
    Decode(String),

    /// Input is truncated
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Value cannot be represented in the chosen storage format
    #[error("Encode error: {0}")]
    Encode(String),

    /// Element or record index out of bounds
    #[error("Index {index} out of bounds (count: {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    /// Metadata entry not found by name
    #[error("Metadata entry not found: {0}")]
    EntryNotFound(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Broad category of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reported before any I/O takes place.
    Configuration,
    /// Read aborted, no acquisition produced.
    Decode,
    /// Write aborted, output left absent.
    Encode,
    /// Underlying file system failure.
    Io,
    /// Anything else (API misuse).
    Other,
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an encode error.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FilenameNotSpecified
            | Self::NoInput
            | Self::Configuration(_)
            | Self::UnsupportedFormat(_) => ErrorKind::Configuration,
            Self::FileNotFound(_) | Self::Io(_) | Self::MmapFailed(_) => ErrorKind::Io,
            Self::Decode(_) | Self::UnexpectedEof(_) => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::IndexOutOfBounds { .. } | Self::EntryNotFound(_) | Self::Other(_) => {
                ErrorKind::Other
            }
        }
    }
}

/// Result type alias for C3D operations.
pub type Result<T> = std::result::Result<T, Error>;

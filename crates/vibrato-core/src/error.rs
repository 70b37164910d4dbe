//! Error types for Vibrato.

use std::path::PathBuf;

use thiserror::Error;

use crate::StreamId;

/// Result type alias using Vibrato's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vibrato.
#[derive(Error, Debug)]
pub enum Error {
    // Decoding errors
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Stream lifecycle errors
    #[error("Stream not found: {0}")]
    NotFound(StreamId),

    #[error("Seek position {position} out of range (stream length is {length} frames)")]
    SeekOutOfRange { position: i64, length: u64 },

    #[error("Stream already closed: {0}")]
    AlreadyClosed(StreamId),

    #[error("Duplicate stream identity: {0}")]
    DuplicateIdentity(StreamId),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    // Output errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::Decode(_) => "DecodeError",
            Self::FileOpen { .. } => "FileOpenError",
            Self::NotFound(_) => "NotFound",
            Self::SeekOutOfRange { .. } => "SeekOutOfRange",
            Self::AlreadyClosed(_) => "AlreadyClosed",
            Self::DuplicateIdentity(_) => "DuplicateIdentity",
            Self::NotImplemented(_) => "NotImplemented",
            Self::AudioOutput(_) => "AudioOutput",
            Self::Json(_) | Self::InvalidArgument(_) => "InvalidArgument",
        }
    }

    /// Returns true if this error means the stream identity no longer addresses anything.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

//! Errors surfaced to channel callers.

use thiserror::Error;

/// Failure of a single method call.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid arguments for {method}: {source}")]
    InvalidArguments {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Playback(#[from] vibrato_core::Error),
}

impl ChannelError {
    /// Machine-readable code sent back in error replies.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownMethod(_) => "UnknownMethod",
            Self::InvalidArguments { .. } => "InvalidArgument",
            Self::Playback(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibrato_core::{Error, StreamId};

    #[test]
    fn test_codes_pass_through() {
        let err = ChannelError::from(Error::NotFound(StreamId::new()));
        assert_eq!(err.code(), "NotFound");
        assert!(err.to_string().starts_with("Stream not found: "));

        assert_eq!(
            ChannelError::UnknownMethod("rewind".into()).code(),
            "UnknownMethod"
        );
    }
}

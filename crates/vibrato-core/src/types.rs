//! Core domain types for Vibrato.

pub mod format;
pub mod info;
pub mod stream_id;

pub use format::AudioFormat;
pub use info::StreamInfo;
pub use stream_id::StreamId;

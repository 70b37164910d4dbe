//! # vibrato-audio
//!
//! Concurrent multi-stream playback for Vibrato.
//!
//! Features:
//! - Symphonia-based decoding of MP3, WAV and Ogg Vorbis into seekable frame sources
//! - Per-stream exclusion between the real-time output thread and control calls
//! - Lock-sharded stream registry keyed by [`StreamId`](vibrato_core::StreamId)
//! - A single shared cpal output that mixes every active stream

pub mod decode;
pub mod frame;
pub mod mixer;
pub mod output;
pub mod registry;
pub mod session;
pub mod stream;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use decode::{decode, Decoded};
pub use frame::{Frame, FrameSource, MemorySource};
pub use mixer::{mixer, Mixer, MixerHandle};
pub use output::{CpalOutput, OutputConfig, OutputDevice};
pub use registry::StreamRegistry;
pub use session::PlaybackSession;
pub use stream::StreamHandle;

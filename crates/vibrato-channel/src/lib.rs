//! # vibrato-channel
//!
//! Exposes a [`PlaybackSession`](vibrato_audio::PlaybackSession) as named
//! methods (`playFile`, `playBuffer`, `listStreams`, `closeStream`,
//! `pauseStream`, `seekStream`, `streamInfo`) and serves them as JSON lines.

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;

pub use config::VibratoConfig;
pub use error::ChannelError;
pub use protocol::{ErrorReply, Outcome, Request, Response};
pub use server::serve;
pub use service::PlaybackService;

/// Name the method surface is registered under.
pub const CHANNEL_NAME: &str = "vibrato";

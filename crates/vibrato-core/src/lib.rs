//! # vibrato-core
//!
//! Core types and error handling shared by the Vibrato playback crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

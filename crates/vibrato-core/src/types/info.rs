//! Read-only stream snapshot.

use serde::{Deserialize, Serialize};

/// Point-in-time view of an open stream, as reported by `streamInfo`.
///
/// `position` may already be stale when read; it is not linearized with an
/// in-flight pull on the output thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    /// Caller-supplied display name.
    pub name: String,
    /// Current frame index.
    pub position: u64,
    /// Total length in frames.
    pub length: u64,
    /// Sample rate in Hz, fixed at creation.
    pub sample_rate: u32,
}

impl StreamInfo {
    /// Frames left before the stream is exhausted.
    pub const fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }
}

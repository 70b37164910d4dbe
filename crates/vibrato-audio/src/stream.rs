//! A single open playback stream shared between control calls and the output thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use vibrato_core::{Error, Result, StreamId, StreamInfo};

use crate::frame::{Frame, FrameSource};

/// Live handle for one open stream.
///
/// Every operation that touches the frame source (`produce_frames`, `seek`,
/// `close`) runs under the same per-handle lock, so a pull never observes a
/// half-applied seek and a seek never lands mid-pull. Streams never contend
/// with each other.
pub struct StreamHandle {
    id: StreamId,
    name: String,
    sample_rate: u32,
    length: u64,
    /// Snapshot of the source position, readable without taking the lock.
    position: AtomicU64,
    /// `None` once closed.
    source: Mutex<Option<Box<dyn FrameSource>>>,
    last_error: Mutex<Option<Arc<Error>>>,
}

impl StreamHandle {
    pub fn new(
        id: StreamId,
        name: impl Into<String>,
        sample_rate: u32,
        source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sample_rate,
            length: source.len(),
            position: AtomicU64::new(source.position()),
            source: Mutex::new(Some(source)),
            last_error: Mutex::new(None),
        }
    }

    pub const fn id(&self) -> StreamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total length in frames.
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Best-effort current frame index; may trail an in-flight pull.
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Most recent non-fatal error seen while producing frames.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.last_error.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.source.lock().is_none()
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            name: self.name.clone(),
            position: self.position(),
            length: self.length,
            sample_rate: self.sample_rate,
        }
    }

    /// Fill `frames` for the output device.
    ///
    /// Never waits on a control operation: if a seek or close holds the
    /// stream, this cycle yields `(0, true)`. A closed stream yields `(0, false)`.
    pub fn produce_frames(&self, frames: &mut [Frame]) -> (usize, bool) {
        let Some(mut guard) = self.source.try_lock() else {
            return (0, true);
        };
        let Some(source) = guard.as_mut() else {
            return (0, false);
        };

        let (written, more) = source.stream(frames);
        self.position.store(source.position(), Ordering::Release);

        if let Some(e) = source.take_error() {
            warn!("Stream {} ({}): {e}", self.id, self.name);
            *self.last_error.lock() = Some(Arc::new(e));
        }

        (written, more)
    }

    /// Reposition the stream; the next pull resumes at `position`.
    pub fn seek(&self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::SeekOutOfRange {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                length: self.length,
            });
        }

        let mut guard = self.source.lock();
        let source = guard.as_mut().ok_or(Error::AlreadyClosed(self.id))?;
        source.seek(position)?;
        self.position.store(source.position(), Ordering::Release);

        debug!("Stream {} seeked to frame {}", self.id, position);
        Ok(())
    }

    /// Release the frame source. Only the first close succeeds.
    pub fn close(&self) -> Result<()> {
        let source = self
            .source
            .lock()
            .take()
            .ok_or(Error::AlreadyClosed(self.id))?;
        source.close()?;

        debug!("Stream {} ({}) closed", self.id, self.name);
        Ok(())
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("length", &self.length)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

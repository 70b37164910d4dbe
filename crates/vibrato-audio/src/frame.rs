//! Seekable PCM frame sources.

use vibrato_core::{Error, Result};

/// One stereo frame: left and right samples in `[-1.0, 1.0]`.
pub type Frame = [f32; 2];

/// Silent frame.
pub const SILENCE: Frame = [0.0, 0.0];

/// A seekable, closable producer of decoded PCM frames.
///
/// A frame source is not safe to read and reposition from two threads at
/// once; [`StreamHandle`](crate::StreamHandle) serializes every call.
pub trait FrameSource: Send {
    /// Fill `frames` from the current position.
    ///
    /// Returns the number of frames written and whether more frames follow.
    /// Once `false` is returned the source stays exhausted until seeked.
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool);

    /// Total length in frames.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the next frame `stream` will produce.
    fn position(&self) -> u64;

    /// Move to `position`, which must lie in `0..=len()`.
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Take the most recent non-fatal error recorded while streaming.
    fn take_error(&mut self) -> Option<Error> {
        None
    }

    /// Release the source and everything it holds open.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Fully decoded PCM held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: Vec<Frame>,
    position: usize,
}

impl MemorySource {
    pub const fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            position: 0,
        }
    }

    /// Drain `source` from its current position to the end.
    pub fn buffer(source: &mut dyn FrameSource) -> Self {
        let mut frames = Vec::new();
        let mut chunk = vec![SILENCE; 4096];
        loop {
            let (n, more) = source.stream(&mut chunk);
            frames.extend_from_slice(&chunk[..n]);
            if !more {
                break;
            }
        }
        Self::new(frames)
    }
}

impl FrameSource for MemorySource {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let remaining = &self.frames[self.position..];
        let n = remaining.len().min(frames.len());
        frames[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        (n, self.position < self.frames.len())
    }

    fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        match usize::try_from(position) {
            Ok(p) if p <= self.frames.len() => {
                self.position = p;
                Ok(())
            }
            _ => Err(Error::SeekOutOfRange {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                length: self.len(),
            }),
        }
    }
}

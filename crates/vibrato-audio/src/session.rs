//! Playback session: the entry point for opening and controlling streams.

use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use symphonia::core::io::MediaSource;
use tracing::{debug, info, warn};
use vibrato_core::{Error, Result, StreamId, StreamInfo};

use crate::decode::decode;
use crate::output::OutputDevice;
use crate::registry::StreamRegistry;
use crate::stream::StreamHandle;

/// Opens streams, registers them, and hands them to the shared output.
///
/// All methods run synchronously on the caller's thread and may be called
/// from any number of threads at once.
pub struct PlaybackSession {
    registry: StreamRegistry,
    output: Arc<dyn OutputDevice>,
}

impl PlaybackSession {
    pub fn new(output: Arc<dyn OutputDevice>) -> Self {
        Self {
            registry: StreamRegistry::new(),
            output,
        }
    }

    /// Decode the file at `path` (format chosen by its suffix) and start playing it.
    pub fn play_file(&self, path: impl AsRef<Path>, name: &str) -> Result<StreamId> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        self.start(&path.to_string_lossy(), Box::new(file), name)
    }

    /// Decode an in-memory buffer as `format` and start playing it.
    pub fn play_buffer(&self, bytes: impl Into<Bytes>, format: &str, name: &str) -> Result<StreamId> {
        self.start(format, Box::new(Cursor::new(bytes.into())), name)
    }

    fn start(
        &self,
        name_or_format: &str,
        source: Box<dyn MediaSource>,
        name: &str,
    ) -> Result<StreamId> {
        debug!("Decoding {name_or_format:?} for stream {name:?}");
        let decoded = decode(name_or_format, source).inspect_err(|e| {
            warn!("Failed to decode {name_or_format:?}: {e}");
        })?;

        let id = StreamId::new();
        let handle = Arc::new(StreamHandle::new(
            id,
            name,
            decoded.sample_rate,
            decoded.source,
        ));

        if let Err(e) = self.registry.insert(Arc::clone(&handle)) {
            let _ = handle.close();
            return Err(e);
        }

        if let Err(e) = self.output.play(Arc::downgrade(&handle)) {
            let _ = self.registry.remove(id);
            let _ = handle.close();
            return Err(e);
        }

        info!(
            "Playing stream {id} ({name}): {} {} Hz, {} frames",
            decoded.format,
            handle.sample_rate(),
            handle.length()
        );
        Ok(id)
    }

    /// Unregister and close a stream. Its identity is invalid afterwards.
    pub fn close_stream(&self, id: StreamId) -> Result<()> {
        let handle = self.registry.remove(id)?;
        handle.close()?;
        info!("Closed stream {id} ({})", handle.name());
        Ok(())
    }

    /// Pausing has no defined semantics yet and always fails.
    pub fn pause_stream(&self, _id: StreamId) -> Result<()> {
        Err(Error::NotImplemented("pauseStream"))
    }

    /// Move a stream to `position` frames. Negative or past-the-end positions fail.
    pub fn seek_stream(&self, id: StreamId, position: i64) -> Result<()> {
        let handle = self.registry.lookup(id)?;
        let position = u64::try_from(position).map_err(|_| Error::SeekOutOfRange {
            position,
            length: handle.length(),
        })?;
        handle.seek(position)
    }

    pub fn stream_info(&self, id: StreamId) -> Result<StreamInfo> {
        Ok(self.registry.lookup(id)?.info())
    }

    /// Most recent non-fatal decode error seen on the output thread.
    pub fn last_error(&self, id: StreamId) -> Result<Option<Arc<Error>>> {
        Ok(self.registry.lookup(id)?.last_error())
    }

    /// Identity to display name of every open stream.
    pub fn list_streams(&self) -> HashMap<StreamId, String> {
        self.registry.enumerate()
    }

    /// Close every open stream.
    pub fn close_all(&self) {
        for handle in self.registry.drain() {
            if let Err(e) = handle.close() {
                warn!("Failed to close stream {}: {e}", handle.id());
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close_all();
    }
}

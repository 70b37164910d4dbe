//! Real-time mixing of every active stream into one output buffer.

use std::sync::Weak;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;
use vibrato_core::{Error, Result};

use crate::frame::{Frame, SILENCE};
use crate::output::OutputDevice;
use crate::stream::StreamHandle;

/// Create a mixer and the handle used to feed it streams.
///
/// `capacity` pre-sizes the scratch buffer in frames; the mixer only
/// allocates again if a callback asks for more.
pub fn mixer(capacity: usize) -> (Mixer, MixerHandle) {
    let (tx, rx) = unbounded();
    let mixer = Mixer {
        incoming: rx,
        active: Vec::new(),
        scratch: vec![SILENCE; capacity],
    };
    (mixer, MixerHandle { tx })
}

/// Consumer side, owned by the output thread.
pub struct Mixer {
    incoming: Receiver<Weak<StreamHandle>>,
    active: Vec<Weak<StreamHandle>>,
    scratch: Vec<Frame>,
}

impl Mixer {
    /// Overwrite `out` with the sum of every active stream.
    ///
    /// Streams that are exhausted, closed, or dropped from the registry are
    /// discarded. Never blocks.
    pub fn mix(&mut self, out: &mut [Frame]) {
        while let Ok(stream) = self.incoming.try_recv() {
            self.active.push(stream);
        }

        out.fill(SILENCE);
        if self.active.is_empty() {
            return;
        }

        if self.scratch.len() < out.len() {
            self.scratch.resize(out.len(), SILENCE);
        }
        let scratch = &mut self.scratch[..out.len()];

        self.active.retain(|weak| {
            let Some(stream) = weak.upgrade() else {
                return false;
            };
            let (n, more) = stream.produce_frames(scratch);
            for (mixed, frame) in out.iter_mut().zip(&scratch[..n]) {
                mixed[0] += frame[0];
                mixed[1] += frame[1];
            }
            if !more {
                trace!("Stream {} finished", stream.id());
            }
            more
        });

        for frame in out.iter_mut() {
            frame[0] = frame[0].clamp(-1.0, 1.0);
            frame[1] = frame[1].clamp(-1.0, 1.0);
        }
    }

    /// Number of streams currently being pulled.
    pub fn active(&self) -> usize {
        self.active.len()
    }
}

/// Producer side: hands streams to the mixer from any thread.
#[derive(Clone)]
pub struct MixerHandle {
    tx: Sender<Weak<StreamHandle>>,
}

impl OutputDevice for MixerHandle {
    fn play(&self, stream: Weak<StreamHandle>) -> Result<()> {
        self.tx
            .send(stream)
            .map_err(|_| Error::AudioOutput("Mixer is no longer running".to_string()))
    }
}

//! Audio decoding using symphonia.
//!
//! The container is chosen from the source name or format tag alone; content
//! bytes are never probed. Each container maps to one symphonia reader.

use symphonia::core::{
    audio::{AudioBufferRef, SampleBuffer},
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions},
};
use symphonia::default::formats::{MpaReader, OggReader, WavReader};
use tracing::{debug, warn};
use vibrato_core::{AudioFormat, Error, Result};

use crate::frame::{Frame, FrameSource, MemorySource};

/// Consecutive packet decode errors tolerated before a stream is ended.
const MAX_DECODE_RETRIES: usize = 3;

/// Frames decoded ahead of a seek target and discarded.
///
/// A decoder restarted after a seek needs one packet of history before its
/// output is valid. 4096 covers the longest Vorbis packet (8192-sample blocks);
/// MP3 back-references are resolved by the demuxer itself.
const SEEK_PREROLL: u64 = 4096;

/// A decoded stream ready for playback.
pub struct Decoded {
    pub source: Box<dyn FrameSource>,
    pub sample_rate: u32,
    pub format: AudioFormat,
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded")
            .field("format", &self.format)
            .field("sample_rate", &self.sample_rate)
            .field("length", &self.source.len())
            .finish_non_exhaustive()
    }
}

/// Select a decoder by `name_or_format` and open `source` with it.
///
/// On failure no frame source is returned and `source` has been dropped.
pub fn decode(name_or_format: &str, source: Box<dyn MediaSource>) -> Result<Decoded> {
    let format = AudioFormat::detect(name_or_format)?;
    let mss = MediaSourceStream::new(source, MediaSourceStreamOptions::default());

    let mut stream = SymphoniaSource::open(mss, format)?;
    let sample_rate = stream.sample_rate;

    let source: Box<dyn FrameSource> = if stream.exact {
        Box::new(stream)
    } else {
        // Length is unknown up front, so buffer everything to keep seeks exact.
        debug!("{format} stream has no frame-exact length, buffering in memory");
        let buffered = MemorySource::buffer(&mut stream);
        if let Some(e) = stream.take_error() {
            warn!("Decoding ended early: {e}");
        }
        Box::new(buffered)
    };

    if source.is_empty() {
        return Err(Error::Decode("stream contains no audio frames".to_string()));
    }

    debug!(
        "Decoded {format} stream: {} Hz, {} frames",
        sample_rate,
        source.len()
    );

    Ok(Decoded {
        source,
        sample_rate,
        format,
    })
}

fn open_reader(mss: MediaSourceStream, format: AudioFormat) -> Result<Box<dyn FormatReader>> {
    let opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let reader: Box<dyn FormatReader> = match format {
        AudioFormat::Mp3 => Box::new(MpaReader::try_new(mss, &opts).map_err(decode_error)?),
        AudioFormat::Wav => Box::new(WavReader::try_new(mss, &opts).map_err(decode_error)?),
        AudioFormat::Vorbis => Box::new(OggReader::try_new(mss, &opts).map_err(decode_error)?),
    };
    Ok(reader)
}

fn decode_error(e: SymphoniaError) -> Error {
    Error::Decode(e.to_string())
}

/// Frame source that decodes packets lazily as frames are pulled.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    /// Declared frame count, or `u64::MAX` when the container does not say.
    length: u64,
    /// Whether `length` is declared and timestamps count frames.
    exact: bool,
    position: u64,
    pending: Vec<Frame>,
    offset: usize,
    /// Frame the next decoded output must start at after a seek.
    seek_target: Option<u64>,
    finished: bool,
    decode_errors: usize,
    error: Option<Error>,
}

impl SymphoniaSource {
    /// Open `mss` as `format` and decode the first packet.
    pub fn open(mss: MediaSourceStream, format: AudioFormat) -> Result<Self> {
        let reader = open_reader(mss, format)?;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio tracks found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Decode("Missing sample rate".to_string()))?;

        // Without a Xing/LAME header MpaReader estimates the length from the bitrate.
        let declared = match format {
            AudioFormat::Mp3 => params.n_frames.is_some() && params.delay.is_some(),
            AudioFormat::Wav | AudioFormat::Vorbis => params.n_frames.is_some(),
        };
        let exact = declared
            && params
                .time_base
                .is_some_and(|tb| tb.numer == 1 && tb.denom == sample_rate);

        debug!(
            "Audio track: id={}, sample_rate={}, frames={:?}, exact={}",
            track_id, sample_rate, params.n_frames, exact
        );

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {e}")))?;

        let mut source = Self {
            format: reader,
            decoder,
            track_id,
            sample_rate,
            length: if exact {
                params.n_frames.unwrap_or_default()
            } else {
                u64::MAX
            },
            exact,
            position: 0,
            pending: Vec::new(),
            offset: 0,
            seek_target: None,
            finished: false,
            decode_errors: 0,
            error: None,
        };

        // Corrupt or truncated data fails here rather than on the output thread.
        if !source.refill()? {
            return Err(Error::Decode("stream contains no audio frames".to_string()));
        }
        source.error = None;

        Ok(source)
    }

    /// Reposition the demuxer at or before `from` and resume output at `target`.
    ///
    /// Everything decoded between the landing point and `target` is dropped,
    /// however many packets that spans.
    fn seek_from(&mut self, from: u64, target: u64) -> Result<()> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: from,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::Decode(format!("Seek failed: {e}")))?;

        self.decoder.reset();
        self.pending.clear();
        self.offset = 0;
        self.seek_target = Some(target);
        self.finished = false;
        self.decode_errors = 0;
        self.position = target;

        debug!(
            "Seeked to frame {} (demuxer landed at {})",
            target, seeked.actual_ts
        );
        Ok(())
    }

    /// Decode the next packet of the selected track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn refill(&mut self) -> Result<bool> {
        self.pending.clear();
        self.offset = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {e}"))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }
            let ts = packet.ts();

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.decode_errors = 0;
                    push_frames(&mut self.pending, decoded);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    self.decode_errors += 1;
                    if self.decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::Decode(format!(
                            "{} consecutive corrupt packets, last: {e}",
                            self.decode_errors
                        )));
                    }
                    warn!("Decode error (skipping packet): {e}");
                    self.error = Some(Error::Decode(e.to_string()));
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {e}"))),
            }

            // Packets that end before the seek target are decoded only to
            // warm up the decoder.
            if let Some(target) = self.seek_target {
                if ts + self.pending.len() as u64 <= target {
                    self.pending.clear();
                    continue;
                }
                self.offset = usize::try_from(target.saturating_sub(ts)).unwrap_or(usize::MAX);
                self.seek_target = None;
            }

            if self.offset < self.pending.len() {
                return Ok(true);
            }
        }
    }
}

impl FrameSource for SymphoniaSource {
    fn stream(&mut self, frames: &mut [Frame]) -> (usize, bool) {
        let mut written = 0;

        while written < frames.len() && self.position < self.length {
            if self.offset >= self.pending.len() {
                if self.finished {
                    break;
                }
                match self.refill() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.finished = true;
                        break;
                    }
                    Err(e) => {
                        self.error = Some(e);
                        self.finished = true;
                        break;
                    }
                }
            }

            let available = &self.pending[self.offset..];
            let wanted = (frames.len() - written) as u64;
            let n = (available.len() as u64)
                .min(wanted)
                .min(self.length - self.position) as usize;
            frames[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            self.offset += n;
            self.position += n as u64;
        }

        let drained = self.finished && self.offset >= self.pending.len();
        (written, self.position < self.length && !drained)
    }

    fn len(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::SeekOutOfRange {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                length: self.length,
            });
        }

        // Some demuxers cannot seek onto the final frame; nothing is left to decode anyway.
        if position == self.length {
            self.pending.clear();
            self.offset = 0;
            self.seek_target = None;
            self.finished = false;
            self.position = position;
            return Ok(());
        }

        self.seek_from(position.saturating_sub(SEEK_PREROLL), position)
    }

    fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

/// Append a decoded packet to `pending` as stereo frames.
///
/// Mono is duplicated to both channels; channels past the second are dropped.
fn push_frames(pending: &mut Vec<Frame>, decoded: AudioBufferRef<'_>) {
    let spec = *decoded.spec();
    let channels = spec.channels.count();
    if channels == 0 || decoded.frames() == 0 {
        return;
    }

    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
    samples.copy_interleaved_ref(decoded);

    pending.extend(samples.samples().chunks_exact(channels).map(|s| {
        if channels == 1 {
            [s[0], s[0]]
        } else {
            [s[0], s[1]]
        }
    }));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::frame::SILENCE;
    use crate::testing::{wav_bytes, wav_sample};
    use std::io::Cursor;

    const SILENCE_MP3: &[u8] = include_bytes!("../tests/fixtures/silence.mp3");
    const SILENCE_XING_MP3: &[u8] = include_bytes!("../tests/fixtures/silence-xing.mp3");
    const SILENCE_OGG: &[u8] = include_bytes!("../tests/fixtures/silence.ogg");

    fn decode_wav(bytes: Vec<u8>) -> Result<Decoded> {
        decode("wav", Box::new(Cursor::new(bytes)))
    }

    fn decode_fixture(name: &str, bytes: &'static [u8]) -> Decoded {
        decode(name, Box::new(Cursor::new(bytes))).unwrap()
    }

    fn drain(source: &mut dyn FrameSource) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut buf = [SILENCE; 1000];
        loop {
            let (n, more) = source.stream(&mut buf);
            frames.extend_from_slice(&buf[..n]);
            if !more {
                break;
            }
        }
        frames
    }

    fn assert_frame(actual: Frame, expected: Frame, tolerance: f32) {
        assert!(
            (actual[0] - expected[0]).abs() <= tolerance
                && (actual[1] - expected[1]).abs() <= tolerance,
            "got {actual:?}, expected {expected:?}"
        );
    }

    /// Seek to each of `positions` and check the rest of the stream follows.
    fn assert_seeks_leave_remainder(decoded: &mut Decoded, positions: &[u64]) {
        let length = decoded.source.len();
        for &position in positions {
            decoded.source.seek(position).unwrap();
            assert_eq!(decoded.source.position(), position);

            let rest = drain(decoded.source.as_mut());
            assert_eq!(rest.len() as u64, length - position, "after seek to {position}");
            assert!(rest.iter().all(|f| *f == SILENCE));
            assert_eq!(decoded.source.position(), length);
        }
    }

    #[test]
    fn test_wav_reports_header_rate_and_length() {
        let decoded = decode_wav(wav_bytes(22050, 2, 1000)).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.format, AudioFormat::Wav);
        assert_eq!(decoded.source.len(), 1000);
        assert_eq!(decoded.source.position(), 0);
    }

    #[test]
    fn test_streams_every_frame() {
        let mut decoded = decode_wav(wav_bytes(44100, 2, 1000)).unwrap();
        let mut buf = [SILENCE; 256];
        let mut total = 0;
        loop {
            let (n, more) = decoded.source.stream(&mut buf);
            total += n;
            if !more {
                break;
            }
        }
        assert_eq!(total, 1000);
        assert_eq!(decoded.source.position(), 1000);
        assert_eq!(decoded.source.stream(&mut buf), (0, false));
    }

    #[test]
    fn test_seek_is_sample_accurate() {
        let mut decoded = decode_wav(wav_bytes(44100, 2, 1000)).unwrap();
        decoded.source.seek(500).unwrap();
        assert_eq!(decoded.source.position(), 500);

        let mut buf = [SILENCE; 1];
        assert_eq!(decoded.source.stream(&mut buf), (1, true));
        assert_frame(buf[0], wav_sample(500, 2), 1e-6);
    }

    #[test]
    fn test_seek_lands_on_target_frame() {
        let mut decoded = decode_wav(wav_bytes(44100, 2, 20_000)).unwrap();
        let mut buf = [SILENCE; 64];

        // Targets before, at and past the preroll distance, plus the final frame.
        for position in [1162, 4096, 4196, 10_000, 19_999] {
            decoded.source.seek(position).unwrap();
            let (n, _) = decoded.source.stream(&mut buf);
            assert!(n > 0);
            for (i, frame) in buf[..n].iter().enumerate() {
                assert_frame(*frame, wav_sample(position as usize + i, 2), 1e-6);
            }
        }
    }

    #[test]
    fn test_seek_drops_every_packet_before_target() {
        let bytes = wav_bytes(44100, 2, 20_000);
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        let mut source = SymphoniaSource::open(mss, AudioFormat::Wav).unwrap();

        // Land the demuxer at the very start, many packets short of the target.
        source.seek_from(0, 5000).unwrap();
        assert_eq!(source.position(), 5000);

        let mut buf = [SILENCE; 3000];
        assert_eq!(source.stream(&mut buf), (3000, true));
        for (i, frame) in buf.iter().enumerate() {
            assert_frame(*frame, wav_sample(5000 + i, 2), 1e-6);
        }
        assert_eq!(source.position(), 8000);
    }

    #[test]
    fn test_seek_to_end_and_back() {
        let mut decoded = decode_wav(wav_bytes(44100, 1, 300)).unwrap();
        let mut buf = [SILENCE; 8];

        decoded.source.seek(300).unwrap();
        assert_eq!(decoded.source.stream(&mut buf), (0, false));

        decoded.source.seek(0).unwrap();
        assert_eq!(decoded.source.stream(&mut buf), (8, true));
        // Mono is spread over both channels.
        assert_eq!(buf[3][0], buf[3][1]);
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut decoded = decode_wav(wav_bytes(44100, 2, 100)).unwrap();
        decoded.source.seek(40).unwrap();
        let err = decoded.source.seek(101).unwrap_err();
        assert_eq!(err.code(), "SeekOutOfRange");
        assert_eq!(decoded.source.position(), 40);
    }

    #[test]
    fn test_unsupported_name() {
        let err = decode("track.flac", Box::new(Cursor::new(vec![0u8; 16]))).unwrap_err();
        assert_eq!(err.code(), "UnsupportedFormat");
    }

    #[test]
    fn test_corrupt_mp3_is_decode_error() {
        let garbage: Vec<u8> = (0..512u32).map(|i| (i * 7 % 13) as u8).collect();
        let err = decode("mp3", Box::new(Cursor::new(garbage))).unwrap_err();
        assert_eq!(err.code(), "DecodeError");
    }

    #[test]
    fn test_truncated_wav_is_decode_error() {
        let mut bytes = wav_bytes(44100, 2, 100);
        bytes.truncate(20);
        let err = decode_wav(bytes).unwrap_err();
        assert_eq!(err.code(), "DecodeError");
    }

    #[test]
    fn test_garbage_ogg_is_decode_error() {
        let err = decode("x.ogg", Box::new(Cursor::new(vec![0xAB; 256]))).unwrap_err();
        assert_eq!(err.code(), "DecodeError");
    }

    #[test]
    fn test_ogg_vorbis_decodes_lazily() {
        let mut decoded = decode_fixture("silence.ogg", SILENCE_OGG);
        assert_eq!(decoded.format, AudioFormat::Vorbis);
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.source.len(), 51_200);

        let frames = drain(decoded.source.as_mut());
        assert_eq!(frames.len(), 51_200);
        assert!(frames.iter().all(|f| *f == SILENCE));
        assert_eq!(decoded.source.position(), 51_200);
    }

    #[test]
    fn test_ogg_vorbis_seek() {
        let mut decoded = decode_fixture("silence.ogg", SILENCE_OGG);
        // 30000 lands mid-page, several packets after the page start.
        assert_seeks_leave_remainder(&mut decoded, &[30_000, 100, 51_200, 4096, 0]);
    }

    #[test]
    fn test_mp3_with_xing_header_decodes_lazily() {
        let mut decoded = decode_fixture("silence-xing.mp3", SILENCE_XING_MP3);
        assert_eq!(decoded.format, AudioFormat::Mp3);
        assert_eq!(decoded.sample_rate, 22050);
        // 45 frames of 576 samples less the declared encoder delay.
        assert_eq!(decoded.source.len(), 25_391);

        let frames = drain(decoded.source.as_mut());
        assert_eq!(frames.len(), 25_391);
        assert!(frames.iter().all(|f| *f == SILENCE));
    }

    #[test]
    fn test_mp3_with_xing_header_seek() {
        let mut decoded = decode_fixture("silence-xing.mp3", SILENCE_XING_MP3);
        assert_seeks_leave_remainder(&mut decoded, &[12_345, 100, 25_000, 25_391, 0]);
    }

    #[test]
    fn test_mp3_without_xing_header_is_buffered() {
        let mut decoded = decode_fixture("silence.mp3", SILENCE_MP3);
        assert_eq!(decoded.format, AudioFormat::Mp3);
        assert_eq!(decoded.sample_rate, 22050);
        let length = decoded.source.len();
        assert!(length > 0 && length < u64::MAX);

        let frames = drain(decoded.source.as_mut());
        assert_eq!(frames.len() as u64, length);
        assert_seeks_leave_remainder(&mut decoded, &[12_345, 100, length / 2, 0]);
    }
}

//! Synthetic audio fixtures for tests.

use std::path::Path;

use crate::frame::Frame;

/// 16-bit sample value written for `frame` on the left channel.
///
/// Consecutive frames differ by one step and the ramp only wraps every 32749
/// frames, so any offset shorter than that shows up in the decoded value.
fn pcm_value(frame: usize) -> i16 {
    ((frame % 32_749) as i16).wrapping_sub(16_374)
}

/// The frame the decoder should yield at index `frame` of [`wav_bytes`] output.
pub fn wav_sample(frame: usize, channels: u16) -> Frame {
    let left = f32::from(pcm_value(frame)) / 32768.0;
    if channels == 1 {
        [left, left]
    } else {
        [left, -left]
    }
}

/// Build a 16-bit PCM RIFF/WAVE file with `frames` frames.
///
/// Left carries a slow ramp; right (when present) carries its negation.
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let block_align = channels * 2;
    let data_len = (frames * usize::from(block_align)) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for frame in 0..frames {
        let value = pcm_value(frame);
        out.extend_from_slice(&value.to_le_bytes());
        if channels > 1 {
            out.extend_from_slice(&(-value).to_le_bytes());
            for _ in 2..channels {
                out.extend_from_slice(&0i16.to_le_bytes());
            }
        }
    }
    out
}

/// Write [`wav_bytes`] to `path`.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) -> std::io::Result<()> {
    std::fs::write(path, wav_bytes(sample_rate, channels, frames))
}

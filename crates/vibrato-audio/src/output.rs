//! Shared audio output using cpal.

use std::sync::Weak;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vibrato_core::{Error, Result};

use crate::frame::{Frame, SILENCE};
use crate::mixer::{mixer, Mixer, MixerHandle};
use crate::stream::StreamHandle;

/// Device that pulls frames from streams on its own real-time thread.
///
/// Implementations must only hold the `Weak` reference; the registry owns
/// the stream and the device stops pulling once it is gone or exhausted.
pub trait OutputDevice: Send + Sync {
    fn play(&self, stream: Weak<StreamHandle>) -> Result<()>;
}

/// Audio output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    /// Mixer rate in Hz. Streams are not resampled to it.
    pub sample_rate: u32,
    /// Requested device buffer in frames; `None` leaves it to the driver.
    pub buffer_frames: Option<u32>,
    /// Output device name; `None` picks the host default.
    pub device: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_frames: Some(4410),
            device: None,
        }
    }
}

/// What the output thread actually opened.
#[derive(Debug, Clone)]
struct OpenedOutput {
    device_name: String,
    sample_rate: u32,
    channels: u16,
}

/// The shared hardware output.
///
/// The cpal stream lives on a dedicated `vibrato-output` thread (cpal
/// streams are not `Send`) and is stopped when this value is dropped.
pub struct CpalOutput {
    mixer: MixerHandle,
    opened: OpenedOutput,
    /// Dropping this wakes the output thread so it tears the stream down.
    _stop: crossbeam_channel::Sender<()>,
}

impl CpalOutput {
    /// Open the configured (or default) device and start mixing.
    pub fn new(config: &OutputConfig) -> Result<Self> {
        let capacity = config.buffer_frames.unwrap_or(4096) as usize;
        let (mixer, handle) = mixer(capacity);
        let (ready_tx, ready_rx) = bounded::<Result<OpenedOutput>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let config = config.clone();

        std::thread::Builder::new()
            .name("vibrato-output".to_string())
            .spawn(move || match open_stream(&config, mixer) {
                Ok((stream, opened)) => {
                    let _ = ready_tx.send(Ok(opened));
                    // Blocks until the owning CpalOutput is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("Audio output stopped");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {e}")))?;

        let opened = ready_rx.recv().map_err(|_| {
            Error::AudioOutput("Output thread exited during startup".to_string())
        })??;

        info!(
            "Audio output initialized: {} Hz, {} channels, device: {}",
            opened.sample_rate, opened.channels, opened.device_name
        );

        Ok(Self {
            mixer: handle,
            opened,
            _stop: stop_tx,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.opened.device_name
    }

    pub const fn sample_rate(&self) -> u32 {
        self.opened.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.opened.channels
    }
}

impl OutputDevice for CpalOutput {
    fn play(&self, stream: Weak<StreamHandle>) -> Result<()> {
        self.mixer.play(stream)
    }
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string())),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
            .find(|d| d.name().is_ok_and(|n| n == wanted))
            .ok_or_else(|| Error::AudioOutput(format!("Output device not found: {wanted}"))),
    }
}

/// Pick a config at the requested rate, preferring stereo and f32.
fn select_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig> {
    let rate = SampleRate(sample_rate);
    let rank = |format: SampleFormat| match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        _ => 2,
    };

    let matching = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to query output configs: {e}")))?
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| {
            matches!(
                range.sample_format(),
                SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
            )
        })
        .min_by_key(|range| (range.channels().abs_diff(2), rank(range.sample_format())));

    if let Some(range) = matching {
        return Ok(range.with_sample_rate(rate));
    }

    warn!("Device does not support {sample_rate} Hz, falling back to its default config");
    device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))
}

fn open_stream(config: &OutputConfig, mixer: Mixer) -> Result<(Stream, OpenedOutput)> {
    let device = find_device(config.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = select_config(&device, config.sample_rate)?;
    debug!("Selected output config: {:?}", supported);

    let buffer_size = match (config.buffer_frames, supported.buffer_size()) {
        (Some(frames), SupportedBufferSize::Range { min, max }) => {
            BufferSize::Fixed(frames.clamp(*min, *max))
        }
        _ => BufferSize::Default,
    };
    let sample_format = supported.sample_format();
    let stream_config = StreamConfig {
        buffer_size,
        ..supported.config()
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer, config)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer, config)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer, config)?,
        _ => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {sample_format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

    Ok((
        stream,
        OpenedOutput {
            device_name,
            sample_rate: stream_config.sample_rate.0,
            channels: stream_config.channels,
        },
    ))
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mut mixer: Mixer,
    output: &OutputConfig,
) -> Result<Stream> {
    let channels = usize::from(config.channels).max(1);
    let mut mixed = vec![SILENCE; output.buffer_frames.unwrap_or(4096) as usize];

    let err_fn = |err| {
        error!("Audio stream error: {err}");
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if mixed.len() < frames {
                    mixed.resize(frames, SILENCE);
                }
                let mixed = &mut mixed[..frames];
                mixer.mix(mixed);
                write_frames(data, channels, mixed);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// Spread stereo frames over the device's channel layout.
fn write_frames<T: SizedSample + FromSample<f32>>(data: &mut [T], channels: usize, mixed: &[Frame]) {
    for (out, frame) in data.chunks_exact_mut(channels).zip(mixed) {
        if channels == 1 {
            out[0] = T::from_sample((frame[0] + frame[1]) * 0.5);
            continue;
        }
        out[0] = T::from_sample(frame[0]);
        out[1] = T::from_sample(frame[1]);
        for sample in &mut out[2..] {
            *sample = T::from_sample(0.0f32);
        }
    }
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OutputConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_frames, Some(4410));
        assert!(config.device.is_none());
    }

    #[test]
    fn test_config_fields_default_individually() {
        let config: OutputConfig = serde_json::from_str(r#"{"sampleRate": 48000}"#).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.buffer_frames, Some(4410));
    }

    #[test]
    fn test_write_frames_stereo_to_quad() {
        let mut data = [9.0f32; 8];
        write_frames(&mut data, 4, &[[0.5, -0.5], [0.25, -0.25]]);
        assert_eq!(data, [0.5, -0.5, 0.0, 0.0, 0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_write_frames_downmixes_mono() {
        let mut data = [0.0f32; 2];
        write_frames(&mut data, 1, &[[0.5, 0.25], [1.0, 0.0]]);
        assert_eq!(data, [0.375, 0.5]);
    }

    #[test]
    fn test_write_frames_ignores_partial_trailing_frame() {
        let mut data = [9.0f32; 5];
        write_frames(&mut data, 2, &[[0.5, -0.5], [0.25, -0.25], [0.1, 0.1]]);
        assert_eq!(data, [0.5, -0.5, 0.25, -0.25, 9.0]);
    }

    #[test]
    fn test_list_devices() {
        // May fail on CI without audio hardware; it must not panic.
        let _ = list_output_devices();
        let _ = default_device_name();
    }
}

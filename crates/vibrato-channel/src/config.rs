//! Host configuration.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use vibrato_audio::OutputConfig;
use vibrato_core::{Error, Result};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "vibrato=info,vibrato_audio=info,vibrato_channel=info";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "VIBRATO_CONFIG";

/// Settings for the `vibrato` host, read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VibratoConfig {
    pub output: OutputConfig,
    /// `tracing` filter directive, e.g. `"vibrato_audio=debug"`.
    pub log_filter: Option<String>,
}

impl VibratoConfig {
    /// Resolve the config: an explicit path, then the default location, then defaults.
    ///
    /// An explicit path must exist; a missing default file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `<platform config dir>/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "vibrato", "Vibrato")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VibratoConfig::default();
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"output": {"sampleRate": 48000, "device": "USB DAC"}, "logFilter": "vibrato_audio=debug"}"#,
        )
        .unwrap();

        let config = VibratoConfig::load(Some(&path)).unwrap();
        assert_eq!(config.output.sample_rate, 48000);
        assert_eq!(config.output.buffer_frames, Some(4410));
        assert_eq!(config.output.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.log_filter(), "vibrato_audio=debug");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = VibratoConfig::load(Some(Path::new("/nonexistent/vibrato.json"))).unwrap_err();
        assert_eq!(err.code(), "FileOpenError");
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ sampleRate").unwrap();
        let err = VibratoConfig::from_path(&path).unwrap_err();
        assert_eq!(err.code(), "InvalidArgument");
    }
}

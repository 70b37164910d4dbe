//! Supported container formats and how a source name selects one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Audio container recognised by the decoder dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG-1/2 Layer III.
    Mp3,
    /// RIFF WAVE.
    Wav,
    /// Ogg container carrying Vorbis.
    Vorbis,
}

impl AudioFormat {
    /// Every supported format.
    pub const ALL: [Self; 3] = [Self::Mp3, Self::Wav, Self::Vorbis];

    /// Match a file name or an explicit format tag by its suffix, ignoring case.
    ///
    /// `"song.MP3"`, `"mp3"` and `"/tmp/a.wav"` all match; content bytes are
    /// never sniffed.
    pub fn detect(name_or_tag: &str) -> Result<Self> {
        let lower = name_or_tag.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| lower.ends_with(format.suffix()))
            .ok_or_else(|| Error::UnsupportedFormat(name_or_tag.to_string()))
    }

    /// Suffix that selects this format.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Vorbis => "ogg",
        }
    }

    /// File extension handed to the demuxer probe as a hint.
    pub const fn extension(self) -> &'static str {
        self.suffix()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_detect_by_file_name() {
        assert_eq!(AudioFormat::detect("a.wav").unwrap(), AudioFormat::Wav);
        assert_eq!(
            AudioFormat::detect("/music/Track 01.MP3").unwrap(),
            AudioFormat::Mp3
        );
        assert_eq!(AudioFormat::detect("x.Ogg").unwrap(), AudioFormat::Vorbis);
    }

    #[test]
    fn test_detect_by_tag() {
        assert_eq!(AudioFormat::detect("mp3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::detect("WAV").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::detect("ogg").unwrap(), AudioFormat::Vorbis);
    }

    #[test]
    fn test_unsupported() {
        for name in ["song.flac", "", "mp3.txt", "wave"] {
            let err = AudioFormat::detect(name).unwrap_err();
            assert_eq!(err.code(), "UnsupportedFormat", "{name}");
        }
    }

    proptest! {
        /// Property: matching ignores case and whatever precedes the suffix.
        #[test]
        fn detect_ignores_case_and_prefix(
            prefix in "[a-zA-Z0-9 _/.-]{0,24}",
            index in 0usize..3,
            upper in proptest::collection::vec(any::<bool>(), 3),
        ) {
            let format = AudioFormat::ALL[index];
            let suffix: String = format
                .suffix()
                .chars()
                .zip(upper)
                .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
                .collect();
            let name = format!("{prefix}{suffix}");
            prop_assert_eq!(AudioFormat::detect(&name).ok(), Some(format));
        }
    }
}

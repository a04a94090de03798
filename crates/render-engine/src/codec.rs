//! Container/codec selection.
//!
//! Formats are tried in preference order; the first one whose video and
//! audio encoders are both available wins.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use adstudio_common::error::{StudioError, StudioResult};
use serde::{Deserialize, Serialize};

/// Output container together with its codec pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// MP4, H.264 video, AAC audio.
    #[serde(rename = "mp4-h264")]
    Mp4H264,
    /// WebM, VP9 video, Opus audio.
    #[serde(rename = "webm-vp9")]
    WebmVp9,
    /// WebM, VP8 video, Vorbis audio.
    #[serde(rename = "webm-vp8")]
    WebmVp8,
    /// MP4, MPEG-4 Part 2 video, AAC audio. Built into every ffmpeg.
    #[serde(rename = "mp4-mpeg4")]
    Mp4Mpeg4,
}

/// Default preference: MP4 first, WebM fallbacks, then the built-in codec.
pub const DEFAULT_PREFERENCE: [ContainerFormat; 4] = [
    ContainerFormat::Mp4H264,
    ContainerFormat::WebmVp9,
    ContainerFormat::WebmVp8,
    ContainerFormat::Mp4Mpeg4,
];

impl ContainerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4H264 => "mp4-h264",
            Self::WebmVp9 => "webm-vp9",
            Self::WebmVp8 => "webm-vp8",
            Self::Mp4Mpeg4 => "mp4-mpeg4",
        }
    }

    /// File extension of the container.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4H264 | Self::Mp4Mpeg4 => "mp4",
            Self::WebmVp9 | Self::WebmVp8 => "webm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4H264 | Self::Mp4Mpeg4 => "video/mp4",
            Self::WebmVp9 | Self::WebmVp8 => "video/webm",
        }
    }

    /// ffmpeg encoder name for the video stream.
    pub fn video_encoder(self) -> &'static str {
        match self {
            Self::Mp4H264 => "libx264",
            Self::WebmVp9 => "libvpx-vp9",
            Self::WebmVp8 => "libvpx",
            Self::Mp4Mpeg4 => "mpeg4",
        }
    }

    /// ffmpeg encoder name for the audio stream.
    pub fn audio_encoder(self) -> &'static str {
        match self {
            Self::Mp4H264 | Self::Mp4Mpeg4 => "aac",
            Self::WebmVp9 => "libopus",
            Self::WebmVp8 => "libvorbis",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DEFAULT_PREFERENCE
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                StudioError::config(format!(
                    "unknown export format '{s}' (expected one of: mp4-h264, webm-vp9, webm-vp8, mp4-mpeg4)"
                ))
            })
    }
}

/// Reports which formats can be encoded on this system.
pub trait EncoderProbe {
    fn supports(&self, format: ContainerFormat) -> bool;
}

/// Pick the first supported format from `preference`.
pub fn negotiate_format(
    preference: &[ContainerFormat],
    probe: &dyn EncoderProbe,
) -> StudioResult<ContainerFormat> {
    for &format in preference {
        if probe.supports(format) {
            tracing::info!(format = %format, "Selected export container");
            return Ok(format);
        }
        tracing::debug!(format = %format, "Container not supported, trying next");
    }

    let tried: Vec<&str> = preference.iter().map(|f| f.as_str()).collect();
    Err(StudioError::encoder_unsupported(format!(
        "none of the preferred formats can be encoded (tried: {})",
        tried.join(", ")
    )))
}

/// Fixed capability set, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    supported: HashSet<ContainerFormat>,
}

impl StaticProbe {
    pub fn new(supported: impl IntoIterator<Item = ContainerFormat>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
        }
    }

    /// A probe that supports every format.
    pub fn all() -> Self {
        Self::new(DEFAULT_PREFERENCE)
    }
}

impl EncoderProbe for StaticProbe {
    fn supports(&self, format: ContainerFormat) -> bool {
        self.supported.contains(&format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_supported_format_wins() {
        let probe = StaticProbe::new([ContainerFormat::WebmVp9, ContainerFormat::Mp4Mpeg4]);
        let selected = negotiate_format(&DEFAULT_PREFERENCE, &probe).unwrap();
        assert_eq!(selected, ContainerFormat::WebmVp9);
        assert_eq!(selected.extension(), "webm");
    }

    #[test]
    fn test_no_supported_format_is_error() {
        let probe = StaticProbe::default();
        let err = negotiate_format(&DEFAULT_PREFERENCE, &probe).unwrap_err();
        assert!(matches!(err, StudioError::EncoderUnsupported { .. }));
        assert!(err.to_string().contains("mp4-h264"));
    }

    #[test]
    fn test_format_names_round_trip_through_from_str() {
        for format in DEFAULT_PREFERENCE {
            assert_eq!(format.as_str().parse::<ContainerFormat>().unwrap(), format);
        }
        assert!("avi".parse::<ContainerFormat>().is_err());
    }

    #[test]
    fn test_encoder_pairs() {
        assert_eq!(ContainerFormat::Mp4H264.video_encoder(), "libx264");
        assert_eq!(ContainerFormat::WebmVp8.audio_encoder(), "libvorbis");
        assert_eq!(ContainerFormat::Mp4Mpeg4.mime_type(), "video/mp4");
    }
}

//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported files are written.
    pub exports_dir: PathBuf,

    /// Default export settings.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Capture frame rate.
    pub fps: u32,

    /// Mix bus sample rate.
    pub audio_sample_rate: u32,

    /// Mix bus channel count.
    pub audio_channels: u16,

    /// Linear gain applied to the narration track.
    pub narration_gain: f32,

    /// Linear gain applied to the music track (background level).
    pub music_gain: f32,

    /// Container/codec preference, most preferred first
    /// (e.g. "mp4-h264", "webm-vp9", "webm-vp8", "mp4-mpeg4").
    pub formats: Vec<String>,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Driver tick rate for real-time pacing (Hz).
    pub tick_hz: u32,

    /// TrueType font used for captions. Falls back to well-known system fonts.
    pub caption_font: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "adstudio=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exports_dir: dirs_default_exports(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            audio_sample_rate: 48_000,
            audio_channels: 2,
            narration_gain: 1.0,
            music_gain: 0.6,
            formats: vec![
                "mp4-h264".to_string(),
                "webm-vp9".to_string(),
                "webm-vp8".to_string(),
                "mp4-mpeg4".to_string(),
            ],
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            tick_hz: 60,
            caption_font: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("adstudio").join("config.json")
}

/// Default exports directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("adstudio").join("exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_defaults_match_studio_levels() {
        let defaults = ExportDefaults::default();
        assert_eq!(defaults.fps, 30);
        assert!((defaults.music_gain - 0.6).abs() < f32::EPSILON);
        assert!((defaults.narration_gain - 1.0).abs() < f32::EPSILON);
        assert_eq!(defaults.formats.first().map(String::as_str), Some("mp4-h264"));
        assert_eq!(defaults.formats.last().map(String::as_str), Some("mp4-mpeg4"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "exports_dir": "/tmp/out", "export": { "fps": 24 } }"#)
                .unwrap();
        assert_eq!(parsed.exports_dir, PathBuf::from("/tmp/out"));
        assert_eq!(parsed.export.fps, 24);
        assert_eq!(parsed.export.audio_sample_rate, 48_000);
        assert_eq!(parsed.logging.level, "info");
    }
}

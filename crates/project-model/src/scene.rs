//! Scene and overlay types.
//!
//! A scene is one independently produced clip on the timeline. Scenes are
//! played back-to-back in `order`; the timeline length is the sum of their
//! durations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Sort key; unique within a project.
    pub order: u32,

    /// Scene length in seconds. Must be positive and finite.
    #[serde(rename = "duration")]
    pub duration_secs: f64,

    /// Video clip or still image shown for this scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<MediaLocator>,

    /// Caption text drawn over the frame during export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Caption placement and size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayConfig>,
}

impl Scene {
    pub fn new(order: u32, duration_secs: f64) -> Self {
        Self {
            order,
            duration_secs,
            visual: None,
            caption: None,
            overlay: None,
        }
    }

    pub fn with_visual(mut self, visual: impl Into<MediaLocator>) -> Self {
        self.visual = Some(visual.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_overlay(mut self, position: OverlayPosition, size: OverlaySize) -> Self {
        self.overlay = Some(OverlayConfig { position, size });
        self
    }

    /// Caption text if it contains anything drawable.
    pub fn visible_caption(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Overlay settings with defaults applied.
    pub fn overlay_or_default(&self) -> OverlayConfig {
        self.overlay.unwrap_or_default()
    }
}

/// Caption placement on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub position: OverlayPosition,
    pub size: OverlaySize,
}

/// Seven-way caption anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    #[default]
    Center,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl OverlayPosition {
    pub const ALL: [OverlayPosition; 7] = [
        OverlayPosition::Center,
        OverlayPosition::Top,
        OverlayPosition::Bottom,
        OverlayPosition::TopLeft,
        OverlayPosition::TopRight,
        OverlayPosition::BottomLeft,
        OverlayPosition::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown overlay position '{s}'"))
    }
}

/// Caption size class. Pixel size scales with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlaySize {
    Small,
    Medium,
    #[default]
    Large,
    Xl,
}

impl OverlaySize {
    /// Font size in pixels on a canvas whose short side is 720px.
    pub fn base_px(self) -> f32 {
        match self {
            Self::Small => 24.0,
            Self::Medium => 36.0,
            Self::Large => 48.0,
            Self::Xl => 72.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xl => "xl",
        }
    }
}

impl fmt::Display for OverlaySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlaySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "xl" => Ok(Self::Xl),
            other => Err(format!("unknown overlay size '{other}'")),
        }
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Portrait),
            other => Err(format!("unknown aspect ratio '{other}' (expected 16:9 or 9:16)")),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landscape => f.write_str("16:9"),
            Self::Portrait => f.write_str("9:16"),
        }
    }
}

/// Output resolution class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoResolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl VideoResolution {
    /// Long and short edge in pixels.
    pub fn edges(self) -> (u32, u32) {
        match self {
            Self::Hd => (1280, 720),
            Self::FullHd => (1920, 1080),
        }
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hd => f.write_str("720p"),
            Self::FullHd => f.write_str("1080p"),
        }
    }
}

/// Opaque handle to a media file or URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this locator is a URL rather than a filesystem path.
    pub fn is_url(&self) -> bool {
        self.0.contains("://")
    }

    /// Resolve against the project root. URLs and absolute paths pass through.
    pub fn resolve(&self, base: &Path) -> PathBuf {
        let path = Path::new(&self.0);
        if self.is_url() || path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let tail = self.0.split(['?', '#']).next().unwrap_or_default();
        Path::new(tail)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl From<&str> for MediaLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MediaLocator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_defaults_to_center_large() {
        let scene: Scene = serde_json::from_str(r#"{ "order": 0, "duration": 4 }"#).unwrap();
        let overlay = scene.overlay_or_default();
        assert_eq!(overlay.position, OverlayPosition::Center);
        assert_eq!(overlay.size, OverlaySize::Large);

        let scene: Scene = serde_json::from_str(
            r#"{ "order": 1, "duration": 6, "overlay": { "position": "bottom-right" } }"#,
        )
        .unwrap();
        let overlay = scene.overlay_or_default();
        assert_eq!(overlay.position, OverlayPosition::BottomRight);
        assert_eq!(overlay.size, OverlaySize::Large);
    }

    #[test]
    fn test_unknown_overlay_values_rejected() {
        let bad_position = serde_json::from_str::<Scene>(
            r#"{ "order": 0, "duration": 4, "overlay": { "position": "middle" } }"#,
        );
        assert!(bad_position.is_err());

        let bad_size = serde_json::from_str::<Scene>(
            r#"{ "order": 0, "duration": 4, "overlay": { "size": "huge" } }"#,
        );
        assert!(bad_size.is_err());

        assert!("middle".parse::<OverlayPosition>().is_err());
        assert_eq!(
            "top-left".parse::<OverlayPosition>().unwrap(),
            OverlayPosition::TopLeft
        );
    }

    #[test]
    fn test_visible_caption_ignores_whitespace() {
        let scene = Scene::new(0, 4.0).with_caption("   ");
        assert_eq!(scene.visible_caption(), None);
        let scene = Scene::new(0, 4.0).with_caption(" Buy now ");
        assert_eq!(scene.visible_caption(), Some("Buy now"));
    }

    #[test]
    fn test_media_locator_resolution() {
        let base = Path::new("/projects/ad");
        assert_eq!(
            MediaLocator::new("clips/a.mp4").resolve(base),
            PathBuf::from("/projects/ad/clips/a.mp4")
        );
        assert_eq!(
            MediaLocator::new("/abs/b.mp4").resolve(base),
            PathBuf::from("/abs/b.mp4")
        );
        let url = MediaLocator::new("https://cdn.example.com/c.mp4?sig=1");
        assert!(url.is_url());
        assert_eq!(url.extension().as_deref(), Some("mp4"));
    }

    #[test]
    fn test_aspect_ratio_serde_strings() {
        assert_eq!(
            serde_json::to_string(&AspectRatio::Portrait).unwrap(),
            "\"9:16\""
        );
        let parsed: VideoResolution = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(parsed, VideoResolution::FullHd);
        assert!("4:3".parse::<AspectRatio>().is_err());
    }
}

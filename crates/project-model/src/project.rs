//! Project metadata and loading.
//!
//! A project ties together the ordered scene list, the narration and music
//! tracks, and the output framing (aspect ratio and resolution).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::{AspectRatio, MediaLocator, OverlayPosition, OverlaySize, Scene, VideoResolution};

/// Name of the project file inside a project directory.
pub const PROJECT_FILE_NAME: &str = "project.json";

/// Current schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Top-level project file (`project.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable title; also names the exported file.
    pub title: String,

    /// Scenes in timeline order.
    #[serde(default)]
    pub scenes: Vec<Scene>,

    /// Voice-over track spanning the whole timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<MediaLocator>,

    /// Background music track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MediaLocator>,

    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    pub resolution: VideoResolution,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Project {
    /// Create an empty project.
    pub fn new(title: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            version: default_version(),
            title: title.into(),
            scenes: vec![],
            narration: None,
            music: None,
            aspect_ratio,
            resolution: VideoResolution::default(),
        }
    }

    /// Output canvas size in pixels.
    pub fn output_size(&self) -> (u32, u32) {
        let (long, short) = self.resolution.edges();
        match self.aspect_ratio {
            AspectRatio::Landscape => (long, short),
            AspectRatio::Portrait => (short, long),
        }
    }

    /// Scene durations in timeline order.
    pub fn durations(&self) -> Vec<f64> {
        self.scenes.iter().map(|s| s.duration_secs).collect()
    }

    /// Timeline length: the sum of all scene durations.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }

    /// Sort scenes by their `order` key.
    pub fn sort_scenes(&mut self) {
        self.scenes.sort_by_key(|s| s.order);
    }

    /// Export file name: `<sanitized title>_final_mix.<ext>`.
    pub fn export_file_name(&self, extension: &str) -> String {
        format!("{}_final_mix.{extension}", sanitize_title(&self.title))
    }

    /// Structural checks that make the timeline well-defined.
    pub fn validate(&self) -> Result<(), ProjectError> {
        let mut seen = HashSet::new();
        for scene in &self.scenes {
            if !seen.insert(scene.order) {
                return Err(ProjectError::ValidationError {
                    message: format!("duplicate scene order {}", scene.order),
                });
            }
            if !scene.duration_secs.is_finite() || scene.duration_secs <= 0.0 {
                return Err(ProjectError::ValidationError {
                    message: format!(
                        "scene {} has invalid duration {}",
                        scene.order, scene.duration_secs
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Turn a title into a file-name stem.
///
/// Whitespace runs become `_`; anything other than ASCII alphanumerics,
/// `-`, `_` and `.` is dropped. Empty results become `untitled`.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_space = false;
    for ch in title.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The complete in-memory representation of a loaded project.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    /// Directory that relative media locators resolve against.
    pub root: PathBuf,

    /// Project metadata.
    pub project: Project,
}

impl LoadedProject {
    /// Load a project from a `project.json` file or a directory containing one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let (root, project_path) = if path.is_dir() {
            (path.to_path_buf(), path.join(PROJECT_FILE_NAME))
        } else {
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, path.to_path_buf())
        };

        let project_json =
            std::fs::read_to_string(&project_path).map_err(|e| ProjectError::IoError {
                path: project_path.clone(),
                source: e,
            })?;

        let mut project: Project =
            serde_json::from_str(&project_json).map_err(|e| ProjectError::ParseError {
                path: project_path,
                source: e,
            })?;
        project.sort_scenes();

        Ok(Self { root, project })
    }

    /// Save the project file into `root`.
    pub fn save(&self) -> Result<PathBuf, ProjectError> {
        std::fs::create_dir_all(&self.root).map_err(|e| ProjectError::IoError {
            path: self.root.clone(),
            source: e,
        })?;

        let project_path = self.root.join(PROJECT_FILE_NAME);
        let project_json =
            serde_json::to_string_pretty(&self.project).map_err(|e| ProjectError::ParseError {
                path: project_path.clone(),
                source: e,
            })?;
        std::fs::write(&project_path, project_json).map_err(|e| ProjectError::IoError {
            path: project_path.clone(),
            source: e,
        })?;

        Ok(project_path)
    }

    /// Create a starter project on disk with a `media/` directory.
    pub fn create(
        root: impl AsRef<Path>,
        title: impl Into<String>,
        aspect_ratio: AspectRatio,
    ) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        let media_dir = root.join("media");
        std::fs::create_dir_all(&media_dir).map_err(|e| ProjectError::IoError {
            path: media_dir,
            source: e,
        })?;

        let loaded = Self {
            root,
            project: template(title, aspect_ratio),
        };
        loaded.save()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        self.project.validate()
    }

    /// Resolve a locator against the project root.
    pub fn resolve(&self, locator: &MediaLocator) -> PathBuf {
        locator.resolve(&self.root)
    }

    /// List referenced local media files that do not exist. URLs are not checked.
    pub fn validate_sources(&self) -> Vec<String> {
        let mut errors = vec![];

        let mut check = |locator: &Option<MediaLocator>, label: String| {
            if let Some(locator) = locator {
                if !locator.is_url() && !self.resolve(locator).exists() {
                    errors.push(format!("{label} source missing: {locator}"));
                }
            }
        };

        for scene in &self.project.scenes {
            check(&scene.visual, format!("Scene {}", scene.order));
        }
        check(&self.project.narration, "Narration".to_string());
        check(&self.project.music, "Music".to_string());

        errors
    }
}

/// A three-scene starter timeline.
pub fn template(title: impl Into<String>, aspect_ratio: AspectRatio) -> Project {
    let mut project = Project::new(title, aspect_ratio);
    project.scenes = vec![
        Scene::new(0, 4.0)
            .with_visual("media/scene-0.mp4")
            .with_caption("Meet the product")
            .with_overlay(OverlayPosition::Top, OverlaySize::Large),
        Scene::new(1, 6.0)
            .with_visual("media/scene-1.mp4")
            .with_caption("Built for every day")
            .with_overlay(OverlayPosition::Center, OverlaySize::Medium),
        Scene::new(2, 4.0)
            .with_visual("media/scene-2.png")
            .with_caption("Order today")
            .with_overlay(OverlayPosition::BottomRight, OverlaySize::Xl),
    ];
    project.narration = Some(MediaLocator::new("media/narration.wav"));
    project.music = Some(MediaLocator::new("media/music.mp3"));
    project
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("adstudio_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_output_size_follows_aspect_and_resolution() {
        let mut project = Project::new("Ad", AspectRatio::Landscape);
        assert_eq!(project.output_size(), (1280, 720));
        project.aspect_ratio = AspectRatio::Portrait;
        assert_eq!(project.output_size(), (720, 1280));
        project.resolution = VideoResolution::FullHd;
        assert_eq!(project.output_size(), (1080, 1920));
    }

    #[test]
    fn test_export_file_name() {
        let project = Project::new("Summer  Sale 2025!", AspectRatio::Landscape);
        assert_eq!(
            project.export_file_name("mp4"),
            "Summer_Sale_2025_final_mix.mp4"
        );
        assert_eq!(sanitize_title("  "), "untitled");
        assert_eq!(sanitize_title("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_title("café ad"), "caf_ad");
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_durations() {
        let mut project = Project::new("Ad", AspectRatio::Landscape);
        project.scenes = vec![Scene::new(0, 4.0), Scene::new(0, 6.0)];
        assert!(matches!(
            project.validate(),
            Err(ProjectError::ValidationError { .. })
        ));

        project.scenes = vec![Scene::new(0, 4.0), Scene::new(1, 0.0)];
        assert!(project.validate().is_err());

        project.scenes = vec![Scene::new(0, 4.0), Scene::new(1, f64::INFINITY)];
        assert!(project.validate().is_err());

        project.scenes = vec![Scene::new(0, 4.0), Scene::new(1, 6.0)];
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_minimal_project_json_uses_defaults() {
        let project: Project = serde_json::from_str(
            r#"{ "title": "Ad", "scenes": [ { "order": 0, "duration": 4 } ] }"#,
        )
        .unwrap();
        assert_eq!(project.version, SCHEMA_VERSION);
        assert_eq!(project.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(project.resolution, VideoResolution::Hd);
        assert!(project.narration.is_none());
    }

    #[test]
    fn test_loaded_project_create_and_load() {
        let dir = temp_dir("create_load");

        let created = LoadedProject::create(&dir, "Integration Test", AspectRatio::Portrait).unwrap();
        assert_eq!(created.project.scenes.len(), 3);

        let loaded = LoadedProject::load(&dir).unwrap();
        assert_eq!(loaded.project.title, "Integration Test");
        assert_eq!(loaded.project.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(loaded.root, dir);

        let by_file = LoadedProject::load(dir.join(PROJECT_FILE_NAME)).unwrap();
        assert_eq!(by_file.root, dir);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_sorts_scenes_by_order() {
        let dir = temp_dir("sorted");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(PROJECT_FILE_NAME),
            r#"{ "title": "Ad", "scenes": [
                { "order": 2, "duration": 4 },
                { "order": 0, "duration": 6 },
                { "order": 1, "duration": 4 }
            ] }"#,
        )
        .unwrap();

        let loaded = LoadedProject::load(&dir).unwrap();
        let orders: Vec<u32> = loaded.project.scenes.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(loaded.project.durations(), vec![6.0, 4.0, 4.0]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = temp_dir("validate");
        let mut loaded = LoadedProject::create(&dir, "Validate Test", AspectRatio::Landscape).unwrap();
        loaded.project.music = Some(MediaLocator::new("https://cdn.example.com/music.mp3"));

        let errors = loaded.validate_sources();
        assert!(errors.iter().any(|e| e.contains("Scene 0 source missing")));
        assert!(errors.iter().any(|e| e.contains("Narration source missing")));
        assert!(!errors.iter().any(|e| e.contains("Music")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = temp_dir("missing");
        let result = LoadedProject::load(dir.join(PROJECT_FILE_NAME));
        assert!(matches!(result, Err(ProjectError::IoError { .. })));
    }

    proptest! {
        #[test]
        fn prop_total_is_sum_of_durations(durations in prop::collection::vec(0.1f64..30.0, 0..12)) {
            let mut project = Project::new("Ad", AspectRatio::Landscape);
            project.scenes = durations
                .iter()
                .enumerate()
                .map(|(i, d)| Scene::new(i as u32, *d))
                .collect();
            let expected: f64 = durations.iter().sum();
            prop_assert!((project.total_duration() - expected).abs() < 1e-9);
        }

        #[test]
        fn prop_sanitized_title_is_file_safe(title in ".{0,40}") {
            let name = sanitize_title(&title);
            prop_assert!(!name.is_empty());
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
            prop_assert!(!name.starts_with('.'));
        }
    }
}

//! Error types shared across Ad Studio crates.

use std::path::PathBuf;

/// Top-level error type for sequencing and export operations.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Scene {scene} has no playable source: {message}")]
    SourceUnavailable { scene: usize, message: String },

    #[error("Failed to attach {source_label} to the mix bus: {message}")]
    MixerAttach {
        source_label: String,
        message: String,
    },

    #[error("No supported encoder: {message}")]
    EncoderUnsupported { message: String },

    #[error("Export already in progress (phase: {phase})")]
    ExportBusy { phase: String },

    #[error("Timeline is empty; nothing to export")]
    EmptyTimeline,

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using StudioError.
pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    pub fn source_unavailable(scene: usize, msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            scene,
            message: msg.into(),
        }
    }

    pub fn mixer_attach(source_label: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MixerAttach {
            source_label: source_label.into(),
            message: msg.into(),
        }
    }

    pub fn encoder_unsupported(msg: impl Into<String>) -> Self {
        Self::EncoderUnsupported {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_context() {
        let err = StudioError::ExportBusy {
            phase: "recording".to_string(),
        };
        assert!(err.to_string().contains("recording"));

        let err = StudioError::mixer_attach("narration", "node reuse");
        let msg = err.to_string();
        assert!(msg.contains("narration"));
        assert!(msg.contains("node reuse"));
    }
}

//! Frame compositor: the active scene's picture plus its caption.
//!
//! The compositor owns one output-sized canvas. Each capture tick either
//! redraws it from the active source or leaves it untouched when the source
//! has nothing ready, so the previous frame is repeated.

pub mod caption;
pub mod cover;
pub mod text;

use std::collections::HashSet;

use adstudio_common::error::StudioError;
use adstudio_project_model::scene::Scene;
use image::{Rgba, RgbaImage};

use crate::media::VisualSource;

pub use caption::{layout_caption, CaptionLayout, TextMeasure};
pub use cover::{cover_fit, cover_rect, CoverRect};
pub use text::{CaptionRenderer, GlyphPainter};

/// Fill for scenes without a playable source.
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([24, 24, 28, 255]);

/// Fill when no scene is active.
const IDLE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// What happened to the canvas on a compose call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Source frame drawn (plus caption).
    Composited,
    /// No source for the scene; placeholder drawn (plus caption).
    Placeholder,
    /// Source not ready; canvas left as it was.
    Skipped,
    /// No active scene; canvas cleared.
    Idle,
}

pub struct FrameCompositor {
    canvas: RgbaImage,
    captions: CaptionRenderer,
    warned_scenes: HashSet<usize>,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32, captions: CaptionRenderer) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, IDLE_COLOR),
            captions,
            warned_scenes: HashSet::new(),
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Draw scene `index` at `local_secs` into the canvas.
    pub fn compose(
        &mut self,
        index: usize,
        scene: &Scene,
        source: Option<&mut dyn VisualSource>,
        local_secs: f64,
    ) -> FrameOutcome {
        let (width, height) = self.canvas.dimensions();

        let outcome = match source {
            Some(source) => {
                let Some(frame) = source.poll_frame(local_secs) else {
                    return FrameOutcome::Skipped;
                };
                if frame.dimensions() == (width, height) {
                    self.canvas.copy_from_slice(frame.as_raw());
                } else {
                    match cover_fit(frame, width, height) {
                        Some(fitted) => self.canvas = fitted,
                        None => return FrameOutcome::Skipped,
                    }
                }
                FrameOutcome::Composited
            }
            None => {
                if self.warned_scenes.insert(index) {
                    let err = StudioError::source_unavailable(index, "no playable visual");
                    tracing::warn!(error = %err, "Drawing placeholder");
                }
                fill(&mut self.canvas, PLACEHOLDER_COLOR);
                FrameOutcome::Placeholder
            }
        };

        if let Some(text) = scene.visible_caption() {
            let overlay = scene.overlay_or_default();
            self.captions.render(&mut self.canvas, text, &overlay);
        }

        outcome
    }

    /// Clear the canvas when nothing is active.
    pub fn compose_idle(&mut self) -> FrameOutcome {
        fill(&mut self.canvas, IDLE_COLOR);
        FrameOutcome::Idle
    }
}

fn fill(canvas: &mut RgbaImage, color: Rgba<u8>) {
    for pixel in canvas.pixels_mut() {
        *pixel = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StillSource;

    struct NotReady;

    impl VisualSource for NotReady {
        fn label(&self) -> &str {
            "not-ready"
        }

        fn poll_frame(&mut self, _local_secs: f64) -> Option<&RgbaImage> {
            None
        }
    }

    fn compositor() -> FrameCompositor {
        FrameCompositor::new(16, 9, CaptionRenderer::disabled())
    }

    #[test]
    fn test_composites_source_with_cover_fit() {
        let mut comp = compositor();
        let mut source = StillSource::solid("red", 32, 32, [255, 0, 0, 255]);
        let outcome = comp.compose(0, &Scene::new(0, 4.0), Some(&mut source), 0.0);
        assert_eq!(outcome, FrameOutcome::Composited);
        assert_eq!(comp.canvas().dimensions(), (16, 9));
        assert_eq!(comp.canvas().get_pixel(8, 4).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_source_draws_placeholder() {
        let mut comp = compositor();
        let outcome = comp.compose(1, &Scene::new(1, 4.0).with_caption("Hi"), None, 0.0);
        assert_eq!(outcome, FrameOutcome::Placeholder);
        assert_eq!(*comp.canvas().get_pixel(0, 0), PLACEHOLDER_COLOR);
    }

    #[test]
    fn test_unready_source_leaves_canvas_untouched() {
        let mut comp = compositor();
        let mut green = StillSource::solid("green", 16, 9, [0, 255, 0, 255]);
        comp.compose(0, &Scene::new(0, 4.0), Some(&mut green), 0.0);

        let mut pending = NotReady;
        let outcome = comp.compose(1, &Scene::new(1, 4.0), Some(&mut pending), 0.0);
        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(comp.canvas().get_pixel(3, 3).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_idle_clears_canvas() {
        let mut comp = compositor();
        let mut green = StillSource::solid("green", 16, 9, [0, 255, 0, 255]);
        comp.compose(0, &Scene::new(0, 4.0), Some(&mut green), 0.0);
        assert_eq!(comp.compose_idle(), FrameOutcome::Idle);
        assert_eq!(*comp.canvas().get_pixel(3, 3), IDLE_COLOR);
    }
}
